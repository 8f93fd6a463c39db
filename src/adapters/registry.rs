//! # Adapter Registry
//!
//! Factory for concrete platform adapters, keyed on
//! (platform × delivery mechanism). Both live and dry-run instances are
//! built up front; resolution picks the right one per job, and a
//! process-wide dry-run flag forces the dry-run set regardless of what the
//! job asked for.

use super::{
    AppStoreConnectAdapter, FastlaneAndroidAdapter, FastlaneIosAdapter,
    HostedSubmitAndroidAdapter, HostedSubmitIosAdapter, PlatformAdapter, PlayConsoleAdapter,
    RemoteEndpoint, UnconfiguredEndpoint,
};
use crate::config::PollSettings;
use crate::credentials::CredentialsProvider;
use crate::error::{OrchestratorError, Result};
use crate::model::{DeliveryMechanism, Platform};
use std::collections::HashMap;
use std::sync::Arc;

type AdapterKey = (Platform, DeliveryMechanism);

pub struct AdapterRegistry {
    live: HashMap<AdapterKey, Arc<dyn PlatformAdapter>>,
    dry_run: HashMap<AdapterKey, Arc<dyn PlatformAdapter>>,
    force_dry_run: bool,
}

impl AdapterRegistry {
    /// Build every adapter variant against the given endpoint.
    pub fn new(
        credentials: &CredentialsProvider,
        poll: PollSettings,
        endpoint: Arc<dyn RemoteEndpoint>,
    ) -> Self {
        let mut live = HashMap::new();
        let mut dry_run = HashMap::new();

        for (map, dry) in [(&mut live, false), (&mut dry_run, true)] {
            map.insert(
                (Platform::Ios, DeliveryMechanism::DirectApi),
                Arc::new(AppStoreConnectAdapter::new(
                    credentials.app_store(),
                    endpoint.clone(),
                    poll.clone(),
                    dry,
                )) as Arc<dyn PlatformAdapter>,
            );
            map.insert(
                (Platform::Android, DeliveryMechanism::DirectApi),
                Arc::new(PlayConsoleAdapter::new(
                    credentials.play(),
                    endpoint.clone(),
                    poll.clone(),
                    dry,
                )),
            );
            map.insert(
                (Platform::Ios, DeliveryMechanism::CliTool),
                Arc::new(FastlaneIosAdapter::new(
                    credentials.app_store(),
                    endpoint.clone(),
                    dry,
                )),
            );
            map.insert(
                (Platform::Android, DeliveryMechanism::CliTool),
                Arc::new(FastlaneAndroidAdapter::new(
                    credentials.play(),
                    endpoint.clone(),
                    dry,
                )),
            );
            map.insert(
                (Platform::Ios, DeliveryMechanism::BuildService),
                Arc::new(HostedSubmitIosAdapter::new(
                    credentials.app_store(),
                    endpoint.clone(),
                    poll.clone(),
                    dry,
                )),
            );
            map.insert(
                (Platform::Android, DeliveryMechanism::BuildService),
                Arc::new(HostedSubmitAndroidAdapter::new(
                    credentials.play(),
                    endpoint.clone(),
                    poll.clone(),
                    dry,
                )),
            );
        }

        Self {
            live,
            dry_run,
            force_dry_run: credentials.dry_run(),
        }
    }

    /// Registry with no transport wired; only dry-run resolutions can
    /// execute successfully.
    pub fn unconfigured(credentials: &CredentialsProvider, poll: PollSettings) -> Self {
        Self::new(credentials, poll, Arc::new(UnconfiguredEndpoint))
    }

    /// Replace the adapter registered for a pair, in both the live and
    /// dry-run sets. Used by embedders and test harnesses to install custom
    /// implementations.
    pub fn register(
        &mut self,
        platform: Platform,
        mechanism: DeliveryMechanism,
        adapter: Arc<dyn PlatformAdapter>,
    ) {
        self.live.insert((platform, mechanism), adapter.clone());
        self.dry_run.insert((platform, mechanism), adapter);
    }

    /// Resolve the adapter for a concrete platform.
    ///
    /// `Platform::Both` must be expanded by the caller first; resolution is
    /// always per concrete platform.
    pub fn resolve(
        &self,
        platform: Platform,
        mechanism: DeliveryMechanism,
        dry_run: bool,
    ) -> Result<Arc<dyn PlatformAdapter>> {
        if platform == Platform::Both {
            return Err(OrchestratorError::InvalidState {
                operation: "resolve_adapter".to_string(),
                reason: "adapters resolve per concrete platform, expand Both first".to_string(),
            });
        }
        let map = if dry_run || self.force_dry_run {
            &self.dry_run
        } else {
            &self.live
        };
        map.get(&(platform, mechanism)).cloned().ok_or_else(|| {
            OrchestratorError::configuration(
                "adapter_registry",
                format!("no adapter registered for {platform}/{mechanism}"),
            )
        })
    }
}
