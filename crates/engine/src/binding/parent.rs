//! Capabilities shared by bindings that can have dependent bindings.
//!
//! Implementors provide a handful of hooks; parameter changes, pending-change handling,
//! refresh and suspension are implemented once here on top of them.

use std::sync::Arc;

use bindery_types::{BindingParameters, ChangeReason};
use tracing::debug;

use crate::{
    error::{BindingError, SyncResult},
    model::DependentBinding,
};

pub trait ParentBinding {
    /// Path used in error messages.
    fn binding_path(&self) -> String;

    /// The binding parameters currently in effect.
    fn parameters(&self) -> BindingParameters;

    fn apply_parameters(&self, parameters: BindingParameters, reason: Option<ChangeReason>) -> SyncResult<()>;

    /// Whether the binding's own cache holds unsaved changes.
    fn own_pending_changes(&self) -> bool;

    fn reset_own_changes(&self);

    fn dependent_bindings(&self) -> Vec<Arc<dyn DependentBinding>>;

    /// Whether [`ParentBinding::refresh`] may be called.
    fn is_refreshable(&self) -> bool;

    fn is_relative(&self) -> bool;

    fn is_suspended(&self) -> bool;

    fn set_suspended(&self, suspended: bool);

    /// Rebuilds after [`ParentBinding::resume`].
    fn resume_internal(&self);

    fn refresh_internal(&self, group_id: Option<&str>, check_update: bool);

    fn check_group_id(&self, group_id: Option<&str>) -> SyncResult<()>;

    /// Whether no `change` event has been fired yet.
    fn is_initial(&self) -> bool;

    /// Changes query options. A `null` value removes the option; `$$` binding parameters
    /// cannot be changed. Nothing happens if the effective parameters stay the same.
    fn change_parameters(&self, changes: BindingParameters) -> SyncResult<()> {
        if self.has_pending_changes() {
            return Err(BindingError::PendingChanges {
                action: "change parameters".to_string(),
            });
        }
        let mut parameters = self.parameters();
        let mut changed = false;
        for (name, value) in changes {
            if name.starts_with("$$") {
                return Err(BindingError::from(bindery_util::QueryOptionError::UnsupportedBindingParameter { name }));
            }
            if value.is_null() {
                changed |= parameters.shift_remove(&name).is_some();
            } else if parameters.get(&name) != Some(&value) {
                parameters.insert(name, value);
                changed = true;
            }
        }
        if changed {
            debug!(path = %self.binding_path(), "binding parameters changed");
            self.apply_parameters(parameters, Some(ChangeReason::Change))?;
        }
        Ok(())
    }

    /// Whether this binding or any dependent has unsaved changes.
    fn has_pending_changes(&self) -> bool {
        self.own_pending_changes() || self.dependent_bindings().iter().any(|dependent| dependent.has_pending_changes())
    }

    fn reset_changes(&self) {
        self.reset_own_changes();
        for dependent in self.dependent_bindings() {
            dependent.reset_changes();
        }
    }

    /// Refreshes the binding and its dependents. Only refreshable bindings without pending
    /// changes can be refreshed.
    fn refresh(&self, group_id: Option<&str>) -> SyncResult<()> {
        if !self.is_refreshable() {
            return Err(BindingError::RefreshNotSupported { path: self.binding_path() });
        }
        if self.has_pending_changes() {
            return Err(BindingError::PendingChanges {
                action: "refresh".to_string(),
            });
        }
        self.check_group_id(group_id)?;
        self.refresh_internal(group_id, false);
        Ok(())
    }

    fn suspend(&self) -> SyncResult<()> {
        if self.is_relative() {
            return Err(BindingError::SuspendRelative { path: self.binding_path() });
        }
        if self.is_suspended() {
            return Err(BindingError::AlreadySuspended { path: self.binding_path() });
        }
        self.set_suspended(true);
        Ok(())
    }

    fn resume(&self) -> SyncResult<()> {
        if self.is_relative() {
            return Err(BindingError::SuspendRelative { path: self.binding_path() });
        }
        if !self.is_suspended() {
            return Err(BindingError::NotSuspended { path: self.binding_path() });
        }
        self.set_suspended(false);
        self.resume_internal();
        Ok(())
    }
}
