//! Scenario-based tests for playbook-runner

mod helpers;

mod failure_handling;
mod round_cooldown;
mod skip_filter;
