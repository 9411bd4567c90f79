//! Backend server descriptors.

use super::{ClientPoolDomainError, RemoteTransport, ServerName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A secret injected into a container as an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBinding {
    /// Key of the secret in the secret store.
    pub name: String,
    /// Environment variable receiving the value.
    pub env: String,
}

impl SecretBinding {
    /// Binds secret `name` to environment variable `env`.
    #[must_use]
    pub fn new(name: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env: env.into(),
        }
    }
}

/// A plain environment variable; the value may be a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvBinding {
    /// Variable name.
    pub name: String,
    /// Raw value, either a `{{ ... }}` template or text with `$VAR`
    /// references.
    pub value: String,
}

impl EnvBinding {
    /// Creates an environment binding.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// OAuth configuration of a remote server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSettings {
    /// Names of the OAuth providers the server authenticates with.
    pub providers: Vec<String>,
}

/// How to run a container-backed server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLaunch {
    image: String,
    #[serde(default)]
    command: Vec<String>,
    #[serde(default)]
    volumes: Vec<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    disable_network: bool,
}

impl ContainerLaunch {
    /// Creates a launch description for `image`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientPoolDomainError::EmptyImage`] when `image` is empty
    /// after trimming.
    pub fn new(image: impl Into<String>) -> Result<Self, ClientPoolDomainError> {
        let normalized = image.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(ClientPoolDomainError::EmptyImage);
        }
        Ok(Self {
            image: normalized,
            command: Vec::new(),
            volumes: Vec::new(),
            user: None,
            disable_network: false,
        })
    }

    /// Replaces the command arguments passed after the image.
    #[must_use]
    pub fn with_command(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.command = values.into_iter().collect();
        self
    }

    /// Replaces the volume mounts.
    #[must_use]
    pub fn with_volumes(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.volumes = values.into_iter().collect();
        self
    }

    /// Sets the user the container runs as.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Runs the container without any network.
    #[must_use]
    pub const fn without_network(mut self) -> Self {
        self.disable_network = true;
        self
    }

    /// Returns the image reference.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Returns the raw command arguments.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Returns the raw volume mounts.
    #[must_use]
    pub fn volumes(&self) -> &[String] {
        &self.volumes
    }

    /// Returns the raw user.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Returns whether networking is disabled.
    #[must_use]
    pub const fn disable_network(&self) -> bool {
        self.disable_network
    }
}

/// Where a remote server listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    url: String,
    transport: RemoteTransport,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl RemoteEndpoint {
    /// Creates a remote endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientPoolDomainError`] when `url` is empty or does not use
    /// an HTTP scheme.
    pub fn new(
        url: impl Into<String>,
        transport: RemoteTransport,
    ) -> Result<Self, ClientPoolDomainError> {
        let normalized = url.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(ClientPoolDomainError::EmptyRemoteUrl);
        }
        if !(normalized.starts_with("http://") || normalized.starts_with("https://")) {
            return Err(ClientPoolDomainError::InvalidRemoteUrl(normalized));
        }
        Ok(Self {
            url: normalized,
            transport,
            headers: BTreeMap::new(),
        })
    }

    /// Adds a request header; the value may reference secrets as `$ENV`.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> RemoteTransport {
        self.transport
    }

    /// Returns the raw headers.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// How a backend is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "config")]
pub enum ServerKind {
    /// A container run per connection over stdio.
    Container(ContainerLaunch),
    /// A remote SSE or streamable-HTTP endpoint.
    Remote(RemoteEndpoint),
    /// An always-on companion container reached over TCP.
    Static,
}

/// Read-only description of one backend server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    name: ServerName,
    kind: ServerKind,
    #[serde(default)]
    secrets: Vec<SecretBinding>,
    #[serde(skip)]
    secret_values: BTreeMap<String, String>,
    #[serde(default)]
    env: Vec<EnvBinding>,
    #[serde(default)]
    allow_hosts: Vec<String>,
    #[serde(default)]
    long_lived: bool,
    #[serde(default)]
    oauth: Option<OAuthSettings>,
    #[serde(default)]
    config: serde_json::Value,
}

impl ServerDescriptor {
    /// Creates a descriptor of the given kind.
    #[must_use]
    pub fn new(name: ServerName, kind: ServerKind) -> Self {
        Self {
            name,
            kind,
            secrets: Vec::new(),
            secret_values: BTreeMap::new(),
            env: Vec::new(),
            allow_hosts: Vec::new(),
            long_lived: false,
            oauth: None,
            config: serde_json::Value::Null,
        }
    }

    /// Creates a descriptor for a container-backed server.
    #[must_use]
    pub fn container(name: ServerName, launch: ContainerLaunch) -> Self {
        Self::new(name, ServerKind::Container(launch))
    }

    /// Creates a descriptor for a remote server.
    #[must_use]
    pub fn remote(name: ServerName, endpoint: RemoteEndpoint) -> Self {
        Self::new(name, ServerKind::Remote(endpoint))
    }

    /// Declares a secret binding.
    #[must_use]
    pub fn with_secret(mut self, binding: SecretBinding) -> Self {
        self.secrets.push(binding);
        self
    }

    /// Supplies the resolved value of secret `name`.
    #[must_use]
    pub fn with_secret_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secret_values.insert(name.into(), value.into());
        self
    }

    /// Declares an environment binding.
    #[must_use]
    pub fn with_env(mut self, binding: EnvBinding) -> Self {
        self.env.push(binding);
        self
    }

    /// Replaces the egress allow-list (`hostname:port[/protocol]` specs).
    #[must_use]
    pub fn with_allow_hosts(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.allow_hosts = values.into_iter().collect();
        self
    }

    /// Marks the server as long-lived.
    #[must_use]
    pub const fn with_long_lived(mut self, long_lived: bool) -> Self {
        self.long_lived = long_lived;
        self
    }

    /// Sets the OAuth configuration.
    #[must_use]
    pub fn with_oauth(mut self, oauth: OAuthSettings) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// Sets the user configuration that templates are evaluated against.
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Returns the server name.
    #[must_use]
    pub const fn name(&self) -> &ServerName {
        &self.name
    }

    /// Returns how the backend is reached.
    #[must_use]
    pub const fn kind(&self) -> &ServerKind {
        &self.kind
    }

    /// Returns the declared secret bindings.
    #[must_use]
    pub fn secrets(&self) -> &[SecretBinding] {
        &self.secrets
    }

    /// Returns the resolved value of secret `name`.
    #[must_use]
    pub fn secret_value(&self, name: &str) -> Option<&str> {
        self.secret_values.get(name).map(String::as_str)
    }

    /// Returns the declared environment bindings.
    #[must_use]
    pub fn env(&self) -> &[EnvBinding] {
        &self.env
    }

    /// Returns the egress allow-list.
    #[must_use]
    pub fn allow_hosts(&self) -> &[String] {
        &self.allow_hosts
    }

    /// Returns whether the server asks to be kept between calls.
    #[must_use]
    pub const fn long_lived(&self) -> bool {
        self.long_lived
    }

    /// Returns the OAuth configuration.
    #[must_use]
    pub const fn oauth(&self) -> Option<&OAuthSettings> {
        self.oauth.as_ref()
    }

    /// Returns whether the server authenticates through at least one OAuth
    /// provider.
    #[must_use]
    pub fn uses_oauth(&self) -> bool {
        self.oauth
            .as_ref()
            .is_some_and(|settings| !settings.providers.is_empty())
    }

    /// Returns the template configuration.
    #[must_use]
    pub const fn config(&self) -> &serde_json::Value {
        &self.config
    }
}

impl fmt::Debug for ServerDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted: Vec<&str> = self.secret_values.keys().map(String::as_str).collect();
        formatter
            .debug_struct("ServerDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("secrets", &self.secrets)
            .field("secret_values", &redacted)
            .field("env", &self.env)
            .field("allow_hosts", &self.allow_hosts)
            .field("long_lived", &self.long_lived)
            .field("oauth", &self.oauth)
            .finish_non_exhaustive()
    }
}
