//! Keeps one jira ticket per prometheus alert group.
//!
//! An alertmanager notification is reconciled against the ticket carrying the
//! group's label: a missing ticket is created, an existing one is updated and,
//! if it was resolved recently, reopened. See [notify::Reconciler].

pub mod alert;
pub mod config;
pub mod group_label;
pub mod jira;
pub mod notify;
pub mod template;
pub mod ticket;
