//! The provider: every resource and data source type, sharing one set of
//! clients.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::pingone::ClientBundle;

use super::{
    DataSource, Dispatcher, LookupDataSource, MfaDevicePolicy, MfaFido2Policy, ProviderData,
    Resource, RiskPolicy, RiskPredictor, VerifyPolicy, VerifyVoicePhrase, VerifyVoicePhraseContent,
};

/// Registry of resource and data source types by type name.
pub struct Provider {
    data: Arc<ProviderData>,
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("region", &self.data.clients.region)
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Provider {
    /// Registers every type against `data`.
    #[must_use]
    pub fn new(data: Arc<ProviderData>) -> Self {
        let resources: Vec<Arc<dyn Resource>> = vec![
            Arc::new(Dispatcher::<MfaDevicePolicy>::new(Arc::clone(&data))),
            Arc::new(Dispatcher::<MfaFido2Policy>::new(Arc::clone(&data))),
            Arc::new(Dispatcher::<RiskPolicy>::new(Arc::clone(&data))),
            Arc::new(Dispatcher::<RiskPredictor>::new(Arc::clone(&data))),
            Arc::new(Dispatcher::<VerifyPolicy>::new(Arc::clone(&data))),
            Arc::new(Dispatcher::<VerifyVoicePhrase>::new(Arc::clone(&data))),
            Arc::new(Dispatcher::<VerifyVoicePhraseContent>::new(Arc::clone(&data))),
        ];
        let data_sources: Vec<Arc<dyn DataSource>> = vec![
            Arc::new(LookupDataSource::<RiskPredictor>::new(Arc::clone(&data))),
            Arc::new(LookupDataSource::<VerifyPolicy>::new(Arc::clone(&data))),
            Arc::new(LookupDataSource::<VerifyVoicePhrase>::new(Arc::clone(&data))),
        ];

        Self {
            resources: resources.into_iter().map(|r| (r.type_name(), r)).collect(),
            data_sources: data_sources.into_iter().map(|d| (d.type_name(), d)).collect(),
            data,
        }
    }

    /// Builds the clients from `config` and registers every type.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let clients = ClientBundle::from_config(config)?;
        debug!("Provider configured for region {}", clients.region);
        Ok(Self::new(Arc::new(ProviderData::new(clients, config.retry))))
    }

    /// Shared clients and retry policy.
    #[must_use]
    pub const fn data(&self) -> &Arc<ProviderData> {
        &self.data
    }

    /// The resource type named `type_name`.
    #[must_use]
    pub fn resource(&self, type_name: &str) -> Option<&dyn Resource> {
        self.resources.get(type_name).map(AsRef::as_ref)
    }

    /// The data source type named `type_name`.
    #[must_use]
    pub fn data_source(&self, type_name: &str) -> Option<&dyn DataSource> {
        self.data_sources.get(type_name).map(AsRef::as_ref)
    }

    /// Resource type names, sorted.
    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    /// Data source type names, sorted.
    pub fn data_source_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_sources.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::TreeModel;
    use crate::resource::ResourceKind;
    use crate::resource::testing::offline;

    fn model_matches_schema<K: ResourceKind>() {
        assert_eq!(K::Model::attr_types(), K::schema().attr_types(), "{}", K::TYPE_NAME);
    }

    #[test]
    fn test_every_model_matches_its_schema() {
        model_matches_schema::<MfaDevicePolicy>();
        model_matches_schema::<MfaFido2Policy>();
        model_matches_schema::<RiskPolicy>();
        model_matches_schema::<RiskPredictor>();
        model_matches_schema::<VerifyPolicy>();
        model_matches_schema::<VerifyVoicePhrase>();
        model_matches_schema::<VerifyVoicePhraseContent>();
    }

    #[test]
    fn test_registry_lists_every_type() {
        let provider = Provider::new(offline());
        assert_eq!(
            provider.resource_types().collect::<Vec<_>>(),
            vec![
                "pingone_mfa_device_policy",
                "pingone_mfa_fido2_policy",
                "pingone_risk_policy",
                "pingone_risk_predictor",
                "pingone_verify_policy",
                "pingone_verify_voice_phrase",
                "pingone_verify_voice_phrase_content",
            ]
        );
        assert_eq!(
            provider.data_source_types().collect::<Vec<_>>(),
            vec!["pingone_risk_predictor", "pingone_verify_policy", "pingone_verify_voice_phrase"]
        );
    }

    #[test]
    fn test_lookup_by_type_name() {
        let provider = Provider::new(offline());
        let resource = provider.resource("pingone_risk_policy").expect("registered");
        assert!(resource.schema().attributes.contains_key("policy_weights"));
        assert!(provider.resource("pingone_environment").is_none());

        let data_source = provider.data_source("pingone_verify_policy").expect("registered");
        assert!(data_source.schema().attributes.contains_key("verify_policy_id"));
    }

    #[test]
    fn test_from_config_with_static_token() {
        let config = ProviderConfig::from_lookup(|name| {
            (name == "PINGONE_API_ACCESS_TOKEN").then(|| "tok".to_string())
        })
        .expect("config");
        let provider = Provider::from_config(&config).expect("provider");
        assert_eq!(provider.data().api().base_url(), "https://api.pingone.com/v1");
    }
}
