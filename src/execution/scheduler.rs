//! Skip filter - decides whether a test runs

use crate::core::{
    config::{ContentConf, TestFilter},
    descriptor::TestDescriptor,
    results::SkipReason,
    version::LooseVersion,
};
use std::collections::BTreeMap;

/// What to do with a dequeued test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Bind integration params and run the playbook
    Run,
    /// Record as skipped with the given reason
    Skip(SkipReason),
}

impl Decision {
    pub fn is_run(&self) -> bool {
        matches!(self, Decision::Run)
    }
}

/// Filter and version context shared by every test of a worker
///
/// `decide` only reads this state, so asking twice gives the same answer.
#[derive(Debug, Clone)]
pub struct SkipFilter {
    filter: TestFilter,
    skipped_tests: BTreeMap<String, String>,
    skipped_integrations: BTreeMap<String, String>,
    server_version: LooseVersion,
}

impl SkipFilter {
    pub fn new(
        filter: TestFilter,
        skipped_tests: BTreeMap<String, String>,
        skipped_integrations: BTreeMap<String, String>,
        server_version: &str,
    ) -> Self {
        Self {
            filter,
            skipped_tests,
            skipped_integrations,
            server_version: LooseVersion::parse(server_version),
        }
    }

    pub fn from_conf(conf: &ContentConf, filter: &TestFilter, server_version: &str) -> Self {
        Self::new(
            filter.clone(),
            conf.skipped_tests.clone(),
            conf.skipped_integrations.clone(),
            server_version,
        )
    }

    pub fn server_version(&self) -> &LooseVersion {
        &self.server_version
    }

    /// Integrations of `descriptor` skipped by configuration, with reasons
    pub fn skipped_integrations_of<'a>(
        &'a self,
        descriptor: &'a TestDescriptor,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        descriptor.integrations.iter().filter_map(move |name| {
            self.skipped_integrations
                .get_key_value(name)
                .map(|(name, reason)| (name.as_str(), reason.as_str()))
        })
    }

    /// First matching rule wins: filter, bad test, skipped integration,
    /// version range
    pub fn decide(&self, descriptor: &TestDescriptor) -> Decision {
        let playbook_id = descriptor.playbook_id.as_str();

        if self.filter.is_configured() && !self.filter.contains(playbook_id) {
            return Decision::Skip(SkipReason::Filtered);
        }

        if let Some(reason) = self.skipped_tests.get(playbook_id) {
            return Decision::Skip(SkipReason::BadTest(reason.clone()));
        }

        let skipped: Vec<String> = self
            .skipped_integrations_of(descriptor)
            .map(|(name, _)| name.to_string())
            .collect();
        if !skipped.is_empty() {
            return Decision::Skip(SkipReason::Integration(skipped));
        }

        if !descriptor.supports_version(&self.server_version) {
            return Decision::Skip(SkipReason::VersionMismatch {
                from: descriptor.from_version_or_default().to_string(),
                to: descriptor.to_version_or_default().to_string(),
            });
        }

        Decision::Run
    }
}
