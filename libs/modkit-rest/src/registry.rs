use crate::endpoint::Endpoint;
use crate::error::ConfigError;
use std::sync::Arc;

/// Name → [`Endpoint`] table.
///
/// Populated once at startup and read-only afterwards, so lookups take no
/// lock. Registration order is kept: a lookup without a name resolves to
/// the first registered endpoint.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: Vec<Arc<Endpoint>>,
}

impl EndpointRegistry {
    #[must_use]
    pub fn builder() -> EndpointRegistryBuilder {
        EndpointRegistryBuilder::default()
    }

    /// Look up an endpoint by name, or the first registered one for `None`.
    ///
    /// # Errors
    /// Returns [`ConfigError::EmptyRegistry`] or [`ConfigError::UnknownEndpoint`].
    pub fn get(&self, name: Option<&str>) -> Result<&Arc<Endpoint>, ConfigError> {
        match name {
            None => self.endpoints.first().ok_or(ConfigError::EmptyRegistry),
            Some(name) => {
                if self.endpoints.is_empty() {
                    return Err(ConfigError::EmptyRegistry);
                }
                self.endpoints
                    .iter()
                    .find(|e| e.name() == name)
                    .ok_or_else(|| ConfigError::UnknownEndpoint(name.to_owned()))
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|e| e.name())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Builder for [`EndpointRegistry`].
#[derive(Debug, Default)]
#[must_use = "EndpointRegistryBuilder does nothing until .build() is called"]
pub struct EndpointRegistryBuilder {
    endpoints: Vec<Arc<Endpoint>>,
    error: Option<ConfigError>,
}

impl EndpointRegistryBuilder {
    pub fn register(mut self, endpoint: Endpoint) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.endpoints.iter().any(|e| e.name() == endpoint.name()) {
            self.error = Some(ConfigError::DuplicateEndpoint(endpoint.name().to_owned()));
            return self;
        }
        self.endpoints.push(Arc::new(endpoint));
        self
    }

    /// Freeze the registry.
    ///
    /// # Errors
    /// Returns [`ConfigError::DuplicateEndpoint`] if a name was registered twice.
    pub fn build(self) -> Result<EndpointRegistry, ConfigError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(EndpointRegistry {
                endpoints: self.endpoints,
            }),
        }
    }
}
