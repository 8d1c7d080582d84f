// SPDX-License-Identifier: MIT

//! Built-in state sets: install, uninstall, update, plus the small
//! configure and restore sequences.
//!
//! The sets are assembled from a common pool of descriptors. Two points
//! are deliberate:
//!
//! - `dependencies` routes `Ok` to `install` in the install set but to
//!   `remove-wrappers` in the update set. The routing is a property of the
//!   set instance, never of the event.
//! - States in the irreversible teardown sequence carry no `Cancel`
//!   transition; cancellation there is downgraded by scheduler policy and
//!   the table enforces it a second time.

use crate::machine::{StateDescriptor, StateSet};
use chef_core::Outcome::{Cancel, Failed, Ok, Retry, Wait};
use chef_core::StateTag::{self, *};
use chef_core::TxnKind;

fn state(tag: StateTag, transitions: Vec<(chef_core::Outcome, StateTag)>) -> StateDescriptor {
    StateDescriptor::new(tag, transitions)
}

fn terminals() -> Vec<StateDescriptor> {
    vec![
        StateDescriptor::terminal(Completed),
        StateDescriptor::terminal(Error),
        StateDescriptor::terminal(Cancelled),
    ]
}

/// Shared acquisition prefix: precheck through dependencies. The caller
/// picks where `dependencies` routes its `Ok`.
fn acquisition(deps_ok_target: StateTag) -> Vec<StateDescriptor> {
    vec![
        state(
            Precheck,
            vec![
                (Ok, Download),
                (Wait, PrecheckWait),
                (Failed, Error),
                (Cancel, Cancelled),
            ],
        ),
        state(
            PrecheckWait,
            vec![
                (Ok, Precheck),
                (Wait, PrecheckWait),
                (Failed, Error),
                (Cancel, Cancelled),
            ],
        ),
        state(
            Download,
            vec![
                (Ok, Verify),
                (Wait, DownloadRetry),
                (Retry, DownloadRetry),
                (Failed, Error),
                (Cancel, Cancelled),
            ],
        ),
        state(
            DownloadRetry,
            vec![
                (Ok, Download),
                (Wait, DownloadRetry),
                (Retry, DownloadRetry),
                (Failed, Error),
                (Cancel, Cancelled),
            ],
        ),
        state(Verify, vec![(Ok, Dependencies), (Failed, Error), (Cancel, Cancelled)]),
        state(
            Dependencies,
            vec![
                (Ok, deps_ok_target),
                (Wait, DependenciesWait),
                (Failed, Error),
                (Cancel, Cancelled),
            ],
        ),
        state(
            DependenciesWait,
            vec![
                (Ok, Dependencies),
                (Wait, DependenciesWait),
                (Failed, Error),
                (Cancel, Cancelled),
            ],
        ),
    ]
}

/// Forward activation suffix: mount through generate-wrappers.
fn activation() -> Vec<StateDescriptor> {
    vec![
        state(Mount, vec![(Ok, Load), (Failed, Error), (Cancel, Cancelled)]),
        state(Load, vec![(Ok, StartServices), (Failed, Error), (Cancel, Cancelled)]),
        state(
            StartServices,
            vec![(Ok, GenerateWrappers), (Failed, Error), (Cancel, Cancelled)],
        ),
        state(
            GenerateWrappers,
            vec![(Ok, Completed), (Failed, Error), (Cancel, Cancelled)],
        ),
    ]
}

/// Irreversible teardown: no `Cancel` transitions from stop-services on.
fn teardown(unmount_ok_target: StateTag) -> Vec<StateDescriptor> {
    vec![
        state(
            RemoveWrappers,
            vec![(Ok, StopServices), (Failed, Error), (Cancel, Cancelled)],
        ),
        state(StopServices, vec![(Ok, Unload), (Failed, Error)]),
        state(Unload, vec![(Ok, Unmount), (Failed, Error)]),
        state(Unmount, vec![(Ok, unmount_ok_target), (Failed, Error)]),
    ]
}

/// Install: acquire, write into the store, activate.
pub fn install_set() -> StateSet {
    let mut states = acquisition(Install);
    states.push(state(Install, vec![(Ok, Mount), (Failed, Error), (Cancel, Cancelled)]));
    states.extend(activation());
    states.extend(terminals());
    StateSet::new("install", states)
}

/// Uninstall: tear down, then remove the pack from the store.
pub fn uninstall_set() -> StateSet {
    let mut states = teardown(Uninstall);
    states.push(state(Uninstall, vec![(Ok, Completed), (Failed, Error)]));
    states.extend(terminals());
    StateSet::new("uninstall", states)
}

/// Update: acquire the new revision, tear the old one down, swap, activate.
/// `dependencies` routes `Ok` into the teardown here, not into `install`.
pub fn update_set() -> StateSet {
    let mut states = acquisition(RemoveWrappers);
    states.extend(teardown(Update));
    states.push(state(Update, vec![(Ok, Mount), (Failed, Error)]));
    states.extend(activation());
    states.extend(terminals());
    StateSet::new("update", states)
}

/// Configure: refresh the application index and wrappers in place.
pub fn configure_set() -> StateSet {
    let mut states = vec![
        state(Load, vec![(Ok, GenerateWrappers), (Failed, Error), (Cancel, Cancelled)]),
        state(
            GenerateWrappers,
            vec![(Ok, Completed), (Failed, Error), (Cancel, Cancelled)],
        ),
    ];
    states.extend(terminals());
    StateSet::new("configure", states)
}

/// Restore: the synthetic mount-all pass inserted by restoration when the
/// host mount table no longer matches the installed packs.
pub fn restore_set() -> StateSet {
    let mut states = vec![state(
        Mount,
        vec![(Ok, Completed), (Failed, Error), (Cancel, Cancelled)],
    )];
    states.extend(terminals());
    StateSet::new("restore", states)
}

/// The state set a transaction kind runs.
pub fn state_set(kind: TxnKind) -> StateSet {
    match kind {
        TxnKind::Install => install_set(),
        TxnKind::Uninstall => uninstall_set(),
        TxnKind::Update | TxnKind::Rollback => update_set(),
        TxnKind::Configure => configure_set(),
        TxnKind::Ephemeral => restore_set(),
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
