//! Command routing and authorization
//!
//! The host hands every intercepted command to [`CommandRouter::handle`]
//! before executing it. The router never blocks: creation commands spawn a
//! capture chain and return at once.
//!
//! | class        | privileged | unprivileged                                      |
//! |--------------|------------|---------------------------------------------------|
//! | create       | capture    | capture                                           |
//! | update       | allow      | deny if resolved and not owner, else allow        |
//! | delete       | allow      | deny if unresolved or not owner, else release     |
//! | delete scope | allow      | deny                                              |

use crate::capture::{CaptureOutcome, CaptureRequest, CaptureScheduler};
use crate::config::GuardConfig;
use crate::key::{CanonicalKey, ObjectKind};
use crate::ownership::{OwnerId, OwnershipRegistry};
use crate::store::{MarkerSource, StoreResolver};
use crate::target::TargetDescriptor;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Index of the first positional token after `<command> <subcommand>`
const FIRST_ARG: usize = 2;

/// Decides whether an actor is exempt from ownership checks
pub trait PrivilegeCheck: Send + Sync {
    /// Whether actor is privileged
    fn is_privileged(&self, actor: &OwnerId) -> bool;
}

impl<F> PrivilegeCheck for F
where
    F: Fn(&OwnerId) -> bool + Send + Sync,
{
    fn is_privileged(&self, actor: &OwnerId) -> bool {
        self(actor)
    }
}

/// Fixed set of privileged identities
#[derive(Debug, Clone, Default)]
pub struct PrivilegedSet(HashSet<OwnerId>);

impl PrivilegedSet {
    /// Create set from identities
    #[must_use]
    pub fn new<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OwnerId>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }
}

impl PrivilegeCheck for PrivilegedSet {
    fn is_privileged(&self, actor: &OwnerId) -> bool {
        self.0.contains(actor)
    }
}

/// Delivers rejection notices to actors
pub trait Notifier: Send + Sync {
    /// Send message to recipient
    fn notify(&self, recipient: &OwnerId, message: &str);
}

/// Notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, recipient: &OwnerId, message: &str) {
        tracing::info!("notice to {}: {}", recipient, message);
    }
}

/// Command family the router acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// `add`, `addarea`, `addcircle`, `addline`
    Create(ObjectKind),
    /// `update*`
    Update(ObjectKind),
    /// `delete*` other than `deleteset`
    Delete(ObjectKind),
    /// `deleteset`
    DeleteScope,
}

impl CommandClass {
    /// Classify a lower-cased subcommand
    #[must_use]
    pub fn from_subcommand(sub: &str) -> Option<Self> {
        if sub == "deleteset" {
            return Some(Self::DeleteScope);
        }
        if let Some(suffix) = sub.strip_prefix("delete") {
            return Some(Self::Delete(kind_for_suffix(suffix)));
        }
        if let Some(suffix) = sub.strip_prefix("update") {
            return Some(Self::Update(kind_for_suffix(suffix)));
        }
        match sub {
            "add" | "addarea" | "addcircle" | "addline" => {
                Some(Self::Create(kind_for_suffix(&sub["add".len()..])))
            }
            _ => None,
        }
    }
}

/// Verb suffix → kind; anything unrecognized addresses point markers
fn kind_for_suffix(suffix: &str) -> ObjectKind {
    match suffix {
        "area" => ObjectKind::Area,
        "circle" => ObjectKind::Circle,
        "line" => ObjectKind::Line,
        _ => ObjectKind::Point,
    }
}

/// Side effect of an allowed command
#[derive(Debug)]
pub enum Effect {
    /// Nothing beyond letting the command through
    None,
    /// A capture chain was started
    CaptureScheduled(JoinHandle<CaptureOutcome>),
    /// The actor's ownership record was removed
    OwnershipReleased(CanonicalKey),
    /// Records of a deleted scope were removed
    ScopePurged {
        /// Scope name
        scope: String,
        /// Records removed
        removed: usize,
    },
}

/// Why a command was denied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Action requires a privileged actor
    NotPrivileged,
    /// Target could not be found in the store
    Unresolved,
    /// Target is owned by someone else or by no one
    NotOwner(CanonicalKey),
}

/// Router verdict for one command
#[derive(Debug)]
pub enum Decision {
    /// Not a command the router handles, or no usable target
    Ignore,
    /// Command proceeds
    Allow(Effect),
    /// Command is cancelled and the actor notified
    Deny(DenyReason),
}

impl Decision {
    /// Whether the host must suppress the command
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Deny(_))
    }
}

/// Classifies commands and enforces ownership
pub struct CommandRouter {
    command_name: String,
    deny_message: String,
    purge_scope_on_delete: bool,
    resolver: StoreResolver,
    registry: Arc<OwnershipRegistry>,
    scheduler: CaptureScheduler,
    privileges: Arc<dyn PrivilegeCheck>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("command_name", &self.command_name)
            .field("resolver", &self.resolver)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl CommandRouter {
    /// Create router
    ///
    /// # Arguments
    /// * `config` - Command name, scope, notice text and capture backoff
    /// * `source` - Marker store to resolve targets against
    /// * `registry` - Ownership records, already loaded
    /// * `privileges` - Privilege predicate
    /// * `notifier` - Channel for rejection notices
    #[must_use]
    pub fn new(
        config: &GuardConfig,
        source: Arc<dyn MarkerSource>,
        registry: Arc<OwnershipRegistry>,
        privileges: Arc<dyn PrivilegeCheck>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let resolver = StoreResolver::new(source, config.default_scope.clone());
        let scheduler = CaptureScheduler::new(resolver.clone(), Arc::clone(&registry), config.capture);
        Self {
            command_name: config.command_name.clone(),
            deny_message: config.deny_message.clone(),
            purge_scope_on_delete: config.purge_scope_on_delete,
            resolver,
            registry,
            scheduler,
            privileges,
            notifier,
        }
    }

    /// Resolver used for authorization
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &StoreResolver {
        &self.resolver
    }

    /// Ownership records
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<OwnershipRegistry> {
        &self.registry
    }

    /// Decide on one command issued by actor
    ///
    /// Must run inside a Tokio runtime: creation commands spawn a capture
    /// chain.
    pub fn handle(&self, text: &str, actor: &OwnerId) -> Decision {
        let trimmed = text.trim();
        let body = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let tokens: Vec<&str> = body.split_whitespace().collect();

        if tokens.len() < 2 || !tokens[0].eq_ignore_ascii_case(&self.command_name) {
            return Decision::Ignore;
        }
        let Some(class) = CommandClass::from_subcommand(&tokens[1].to_lowercase()) else {
            return Decision::Ignore;
        };
        let target = TargetDescriptor::extract(body, &tokens, FIRST_ARG);

        match class {
            CommandClass::DeleteScope => self.delete_scope(target, actor),
            CommandClass::Delete(kind) => self.delete(kind, target, actor),
            CommandClass::Create(kind) => self.create(kind, target, actor),
            CommandClass::Update(kind) => self.update(kind, target, actor),
        }
    }

    fn delete_scope(&self, target: Option<TargetDescriptor>, actor: &OwnerId) -> Decision {
        if !self.privileges.is_privileged(actor) {
            return self.deny(actor, DenyReason::NotPrivileged);
        }
        if !self.purge_scope_on_delete {
            return Decision::Allow(Effect::None);
        }

        let scope = target
            .and_then(|t| t.explicit_id.or(t.label))
            .filter(|s| !s.is_empty());
        let Some(scope) = scope else {
            return Decision::Allow(Effect::None);
        };

        let release = self.registry.release_scope(&scope);
        if let Err(e) = release.flushed {
            tracing::debug!("scope '{}' purged in memory only: {}", scope, e);
        }
        let removed = release.removed;
        tracing::info!("Scope '{}' deleted by {}; {} ownership records purged", scope, actor, removed);
        Decision::Allow(Effect::ScopePurged { scope, removed })
    }

    fn delete(&self, kind: ObjectKind, target: Option<TargetDescriptor>, actor: &OwnerId) -> Decision {
        if self.privileges.is_privileged(actor) {
            return Decision::Allow(Effect::None);
        }
        let Some(target) = target else {
            tracing::debug!("delete by {} names no target; letting it through", actor);
            return Decision::Allow(Effect::None);
        };

        let Some(key) = self.resolver.resolve(kind, &target) else {
            return self.deny(actor, DenyReason::Unresolved);
        };
        if !self.registry.is_owner(&key, actor) {
            return self.deny(actor, DenyReason::NotOwner(key));
        }

        if let Err(e) = self.registry.release(&key) {
            tracing::debug!("{} released in memory only: {}", key, e);
        }
        tracing::info!("Released ownership of {} on delete by {}", key, actor);
        Decision::Allow(Effect::OwnershipReleased(key))
    }

    fn create(&self, kind: ObjectKind, target: Option<TargetDescriptor>, actor: &OwnerId) -> Decision {
        let Some(target) = target else {
            return Decision::Ignore;
        };
        let handle = self
            .scheduler
            .schedule(CaptureRequest::new(kind, target, actor.clone()));
        Decision::Allow(Effect::CaptureScheduled(handle))
    }

    fn update(&self, kind: ObjectKind, target: Option<TargetDescriptor>, actor: &OwnerId) -> Decision {
        let Some(target) = target else {
            return Decision::Ignore;
        };
        if self.privileges.is_privileged(actor) {
            return Decision::Allow(Effect::None);
        }

        match self.resolver.resolve(kind, &target) {
            Some(key) if !self.registry.is_owner(&key, actor) => {
                self.deny(actor, DenyReason::NotOwner(key))
            }
            _ => Decision::Allow(Effect::None),
        }
    }

    fn deny(&self, actor: &OwnerId, reason: DenyReason) -> Decision {
        tracing::warn!("Denied command from {}: {:?}", actor, reason);
        self.notifier.notify(actor, &self.deny_message);
        Decision::Deny(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_subcommands() {
        assert_eq!(CommandClass::from_subcommand("deleteset"), Some(CommandClass::DeleteScope));
        assert_eq!(
            CommandClass::from_subcommand("delete"),
            Some(CommandClass::Delete(ObjectKind::Point))
        );
        assert_eq!(
            CommandClass::from_subcommand("deletecircle"),
            Some(CommandClass::Delete(ObjectKind::Circle))
        );
        assert_eq!(
            CommandClass::from_subcommand("addarea"),
            Some(CommandClass::Create(ObjectKind::Area))
        );
        assert_eq!(
            CommandClass::from_subcommand("add"),
            Some(CommandClass::Create(ObjectKind::Point))
        );
        assert_eq!(
            CommandClass::from_subcommand("updateline"),
            Some(CommandClass::Update(ObjectKind::Line))
        );
        assert_eq!(CommandClass::from_subcommand("addset"), None);
        assert_eq!(CommandClass::from_subcommand("list"), None);
    }

    #[test]
    fn privileged_set_membership() {
        let admins = PrivilegedSet::new(["admin-1"]);
        assert!(admins.is_privileged(&OwnerId::new("admin-1")));
        assert!(!admins.is_privileged(&OwnerId::new("player-1")));
    }

    #[test]
    fn closures_are_privilege_checks() {
        let check = |actor: &OwnerId| actor.as_str().starts_with("op-");
        assert!(check.is_privileged(&OwnerId::new("op-7")));
        assert!(!check.is_privileged(&OwnerId::new("user-7")));
    }

    #[test]
    fn only_denials_cancel() {
        assert!(Decision::Deny(DenyReason::Unresolved).is_cancelled());
        assert!(!Decision::Allow(Effect::None).is_cancelled());
        assert!(!Decision::Ignore.is_cancelled());
    }
}
