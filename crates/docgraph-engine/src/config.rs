use serde::{Deserialize, Serialize};

use docgraph_schema::{SchemaRegistry, TypeDescriptor};
use docgraph_types::ID_KEY;

use crate::error::{MapperError, MapperResult};

/// Mapper settings.
///
/// ```toml
/// type_tag_key = "_type"
/// record_diagnostics = true
/// max_diagnostics = 256
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Reserved document key holding the polymorphic type tag.
    pub type_tag_key: String,
    /// Keep attribute access failures for [`crate::Diagnostics`] in
    /// addition to logging them.
    pub record_diagnostics: bool,
    /// Most recorded failures kept; older ones are dropped first.
    pub max_diagnostics: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            type_tag_key: "_type".to_string(),
            record_diagnostics: true,
            max_diagnostics: 256,
        }
    }
}

impl MapperConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> MapperResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| MapperError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> MapperResult<String> {
        toml::to_string(self).map_err(|e| MapperError::Config(e.to_string()))
    }

    /// The tag key must be non-empty and must not shadow `_id`.
    pub fn validate(&self) -> MapperResult<()> {
        if self.type_tag_key.is_empty() {
            return Err(MapperError::Config("type_tag_key is empty".into()));
        }
        if self.type_tag_key == ID_KEY {
            return Err(MapperError::Config(format!(
                "type_tag_key must not be {ID_KEY}"
            )));
        }
        Ok(())
    }

    /// No persisted attribute of a registered type may be stored under
    /// the type tag key.
    pub fn check_schema(&self, registry: &SchemaRegistry) -> MapperResult<()> {
        for name in registry.type_names() {
            if let Some(descriptor) = registry.get(name) {
                self.check_type(descriptor)?;
            }
        }
        Ok(())
    }

    pub(crate) fn check_type(&self, descriptor: &TypeDescriptor) -> MapperResult<()> {
        match descriptor
            .persisted_attributes()
            .find(|a| a.storage_key() == self.type_tag_key)
        {
            Some(attr) => Err(MapperError::Config(format!(
                "{}.{} is stored under the type tag key {}",
                descriptor.name(),
                attr.name(),
                self.type_tag_key
            ))),
            None => Ok(()),
        }
    }
}
