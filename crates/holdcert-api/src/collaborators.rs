//! # External Record Directories
//!
//! Client, investment and template records are owned by other systems. The
//! certificate service only reads them, through [`ClientDirectory`],
//! [`InvestmentDirectory`] and [`TemplateCatalog`].
//!
//! [`InMemoryDirectory`] implements all three and can be seeded from the
//! `directory` section of the configuration file.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use holdcert_core::{ClientId, DecimalAmount, InvestmentId, TemplateId};
use holdcert_state::CertificateType;

/// A certificate holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Client identifier.
    pub id: ClientId,
    /// Name used on certificates and in reports.
    pub display_name: String,
    /// Notification address.
    pub email: String,
}

/// A holding that certificates attest to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentRecord {
    /// Investment identifier.
    pub id: InvestmentId,
    /// Owning client.
    pub client_id: ClientId,
    /// Product or instrument name.
    pub product_name: String,
    /// Invested amount, used when a create request omits it.
    #[serde(default)]
    pub amount: Option<DecimalAmount>,
}

/// A rendering template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    /// Template identifier.
    pub id: TemplateId,
    /// Heading printed on the artifact.
    pub title: String,
    /// Type this template is the default for, if any.
    #[serde(default)]
    pub default_for: Option<CertificateType>,
    /// Closing text printed below the holding details.
    #[serde(default)]
    pub footer: Option<String>,
}

/// Client lookup.
pub trait ClientDirectory: Send + Sync {
    /// Fetch a client.
    fn client(&self, id: &ClientId) -> Option<ClientRecord>;
}

/// Investment lookup.
pub trait InvestmentDirectory: Send + Sync {
    /// Fetch an investment.
    fn investment(&self, id: &InvestmentId) -> Option<InvestmentRecord>;
}

/// Template lookup.
pub trait TemplateCatalog: Send + Sync {
    /// Fetch a template by id.
    fn template(&self, id: &TemplateId) -> Option<TemplateRecord>;

    /// The default template for a certificate type, if one is configured.
    fn default_for(&self, certificate_type: CertificateType) -> Option<TemplateRecord>;
}

/// The three lookups bundled for the components that need them.
#[derive(Clone)]
pub struct Collaborators {
    /// Clients.
    pub clients: Arc<dyn ClientDirectory>,
    /// Investments.
    pub investments: Arc<dyn InvestmentDirectory>,
    /// Templates.
    pub templates: Arc<dyn TemplateCatalog>,
}

impl Collaborators {
    /// Use one in-memory directory for all three lookups.
    pub fn from_directory(directory: Arc<InMemoryDirectory>) -> Self {
        Self {
            clients: directory.clone(),
            investments: directory.clone(),
            templates: directory,
        }
    }

    /// Display name of a client, falling back to the raw id.
    pub fn client_name(&self, id: &ClientId) -> String {
        self.clients
            .client(id)
            .map(|c| c.display_name)
            .unwrap_or_else(|| id.to_string())
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Seed data for [`InMemoryDirectory`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySeed {
    /// Clients.
    pub clients: Vec<ClientRecord>,
    /// Investments.
    pub investments: Vec<InvestmentRecord>,
    /// Templates.
    pub templates: Vec<TemplateRecord>,
}

/// In-memory implementation of every directory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    clients: RwLock<HashMap<ClientId, ClientRecord>>,
    investments: RwLock<HashMap<InvestmentId, InvestmentRecord>>,
    templates: RwLock<HashMap<TemplateId, TemplateRecord>>,
}

impl InMemoryDirectory {
    /// An empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory holding the seed records.
    pub fn seeded(seed: DirectorySeed) -> Self {
        let dir = Self::new();
        seed.clients.into_iter().for_each(|c| dir.put_client(c));
        seed.investments.into_iter().for_each(|i| dir.put_investment(i));
        seed.templates.into_iter().for_each(|t| dir.put_template(t));
        dir
    }

    /// Insert or replace a client.
    pub fn put_client(&self, record: ClientRecord) {
        self.clients.write().insert(record.id.clone(), record);
    }

    /// Insert or replace an investment.
    pub fn put_investment(&self, record: InvestmentRecord) {
        self.investments.write().insert(record.id.clone(), record);
    }

    /// Insert or replace a template.
    pub fn put_template(&self, record: TemplateRecord) {
        self.templates.write().insert(record.id.clone(), record);
    }
}

impl ClientDirectory for InMemoryDirectory {
    fn client(&self, id: &ClientId) -> Option<ClientRecord> {
        self.clients.read().get(id).cloned()
    }
}

impl InvestmentDirectory for InMemoryDirectory {
    fn investment(&self, id: &InvestmentId) -> Option<InvestmentRecord> {
        self.investments.read().get(id).cloned()
    }
}

impl TemplateCatalog for InMemoryDirectory {
    fn template(&self, id: &TemplateId) -> Option<TemplateRecord> {
        self.templates.read().get(id).cloned()
    }

    fn default_for(&self, certificate_type: CertificateType) -> Option<TemplateRecord> {
        let templates = self.templates.read();
        let mut candidates: Vec<&TemplateRecord> = templates
            .values()
            .filter(|t| t.default_for == Some(certificate_type))
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        candidates.first().map(|t| (*t).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"
clients:
  - id: C-1
    display_name: Ada Holdings
    email: ada@example.com
investments:
  - id: I-1
    client_id: C-1
    product_name: Growth Fund
    amount: "2500.00"
templates:
  - id: T-share
    title: Share Certificate
    default_for: SHARE
"#;

    #[test]
    fn seeds_from_yaml() {
        let seed: DirectorySeed = serde_yaml::from_str(SEED).unwrap();
        let dir = InMemoryDirectory::seeded(seed);
        let client = dir.client(&ClientId::new("C-1").unwrap()).unwrap();
        assert_eq!(client.display_name, "Ada Holdings");
        let inv = dir.investment(&InvestmentId::new("I-1").unwrap()).unwrap();
        assert_eq!(inv.amount.unwrap().as_str(), "2500.00");
        assert!(dir.default_for(CertificateType::Share).is_some());
        assert!(dir.default_for(CertificateType::Bond).is_none());
    }

    #[test]
    fn client_name_falls_back_to_id() {
        let collab = Collaborators::from_directory(Arc::new(InMemoryDirectory::new()));
        assert_eq!(collab.client_name(&ClientId::new("C-404").unwrap()), "C-404");
    }
}
