//! Shared application state and per-request tool wiring.

use crate::config::{ChatConfig, ServerConfig};
use jal_mittar_ai::{OpenAiGenerator, Orchestrator, TextGenerator};
use jal_mittar_conversation::{
    LanguagePreference, MessageLog, PgMessageLog, PgSessionStore, SessionStore, ToolSet,
};
use jal_mittar_tools::{
    BillingLookupTool, BillingSigner, CertificateClient, CertificateDownloadTool, Embedder,
    KnowledgeSearchTool, OpenAiEmbedder, QdrantSearch, SimilaritySearch, StatusCheckTool,
};
use sqlx::PgPool;
use std::sync::Arc;

/// Everything the request handlers share.
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub messages: Arc<dyn MessageLog>,
    pub orchestrator: Orchestrator,
    pub certificates: CertificateClient,
    generator: Arc<dyn TextGenerator>,
    embedder: Arc<dyn Embedder>,
    search: Arc<dyn SimilaritySearch>,
    billing_signer: BillingSigner,
    http: reqwest::Client,
    api_base_url: String,
    portal_base_url: String,
    pub cancel_on_disconnect: bool,
    pub secure_cookies: bool,
}

impl AppState {
    /// Wires production collaborators from configuration.
    #[must_use]
    pub fn new(config: &ServerConfig, pool: PgPool) -> Self {
        let http = reqwest::Client::new();
        let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new(
            http.clone(),
            &config.generation.base_url,
            config.generation.api_key.clone(),
            config.generation.model.clone(),
        ));
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
            http.clone(),
            &config.generation.base_url,
            config.generation.api_key.clone(),
            config.generation.embedding_model.clone(),
        ));
        let search: Arc<dyn SimilaritySearch> = Arc::new(QdrantSearch::new(
            http.clone(),
            &config.qdrant.url,
            config.qdrant.collection.clone(),
            config.qdrant.api_key.clone(),
        ));
        let client_id = config
            .billing
            .client_id
            .clone()
            .unwrap_or_else(|| ulid::Ulid::new().to_string());

        Self::from_parts(
            Arc::new(PgSessionStore::new(pool.clone())),
            Arc::new(PgMessageLog::new(pool)),
            generator,
            embedder,
            search,
            CertificateClient::new(http.clone(), &config.edistrict_base_url),
            BillingSigner::new(client_id, config.billing.secret.clone()),
            http,
            &config.api_base_url,
            config.portal_base_url(),
            config.chat.clone(),
        )
    }

    /// Assembles state from explicit collaborators.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_parts(
        sessions: Arc<dyn SessionStore>,
        messages: Arc<dyn MessageLog>,
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        search: Arc<dyn SimilaritySearch>,
        certificates: CertificateClient,
        billing_signer: BillingSigner,
        http: reqwest::Client,
        api_base_url: &str,
        portal_base_url: &str,
        chat: ChatConfig,
    ) -> Self {
        Self {
            sessions,
            messages,
            orchestrator: Orchestrator::new(Arc::clone(&generator)),
            certificates,
            generator,
            embedder,
            search,
            billing_signer,
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            portal_base_url: portal_base_url.trim_end_matches('/').to_string(),
            cancel_on_disconnect: chat.cancel_on_disconnect,
            secure_cookies: chat.secure_cookies,
        }
    }

    fn knowledge_tool(&self, language: Option<LanguagePreference>) -> Arc<KnowledgeSearchTool> {
        Arc::new(KnowledgeSearchTool::new(
            Arc::clone(&self.generator),
            Arc::clone(&self.embedder),
            Arc::clone(&self.search),
            language,
        ))
    }

    /// Tools available to anonymous public sessions.
    #[must_use]
    pub fn public_tools(&self, language: Option<LanguagePreference>) -> ToolSet {
        ToolSet::new()
            .with(self.knowledge_tool(language))
            .with(Arc::new(StatusCheckTool::new(
                self.http.clone(),
                &self.api_base_url,
            )))
            .with(Arc::new(BillingLookupTool::new(
                self.http.clone(),
                &self.portal_base_url,
                self.billing_signer.clone(),
            )))
    }

    /// Tools available to an identified private session.
    ///
    /// The caller identity is bound into the certificate tool here,
    /// never taken from generator arguments.
    #[must_use]
    pub fn private_tools(
        &self,
        user_id: &str,
        language: Option<LanguagePreference>,
    ) -> ToolSet {
        ToolSet::new()
            .with(self.knowledge_tool(language))
            .with(Arc::new(StatusCheckTool::new(
                self.http.clone(),
                &self.api_base_url,
            )))
            .with(Arc::new(CertificateDownloadTool::new(
                self.certificates.clone(),
                user_id,
            )))
    }
}
