//! Policy values as they participate in layered resolution.
//!
//! These types are decoupled from their Kubernetes representations; the index converts custom
//! resources into them. Every type implements [`Merge`] explicitly, field by field.

use crate::merge::Merge;
use std::collections::BTreeMap;

/// Rate limiting applied to an API, one of its resources, or a gateway.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub api: Option<Limit>,
    pub custom: Option<CustomLimit>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Limit {
    pub requests_per_unit: u32,
    pub unit: String,
}

/// A limit applied to requests carrying a specific descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomLimit {
    pub key: String,
    pub value: String,
    pub limit: Limit,
}

/// Request processing configuration applied to an API, a resource or a gateway.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiPolicy {
    /// Names of interceptor services applied to the request flow.
    pub request_interceptors: Vec<String>,
    /// Names of interceptor services applied to the response flow.
    pub response_interceptors: Vec<String>,
    /// Name of the backend JWT configuration to apply, if any.
    pub backend_jwt: Option<BackendJwtRef>,
    pub cors: Option<Cors>,
    pub subscription_validation: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendJwtRef {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cors {
    pub enabled: bool,
    pub allow_credentials: bool,
    pub allow_headers: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_origins: Vec<String>,
    pub expose_headers: Vec<String>,
    pub max_age: u32,
}

/// Client authentication requirements.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Authentication {
    pub disabled: bool,
    pub jwt: Option<Jwt>,
    pub api_key: Option<ApiKey>,
    pub mutual_ssl: Option<MutualSsl>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Jwt {
    pub disabled: bool,
    pub header: String,
    pub send_token_to_upstream: bool,
    pub audience: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiKey {
    pub header: String,
    pub query_param: String,
    pub send_token_to_upstream: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutualSsl {
    pub disabled: bool,
    /// Either `mandatory` or `optional`.
    pub required: String,
    pub certificates: Vec<String>,
}

/// Claims added to the token sent to backends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendJwt {
    pub encoding: String,
    pub signing_algorithm: String,
    pub header: String,
    pub token_ttl: u32,
    pub custom_claims: BTreeMap<String, String>,
}

// === impl Merge ===

impl Merge for RateLimit {
    fn is_unset(&self) -> bool {
        self.api.is_unset() && self.custom.is_unset()
    }

    fn merge(&self, lower: &Self) -> Self {
        Self {
            api: self.api.merge(&lower.api),
            custom: self.custom.merge(&lower.custom),
        }
    }
}

impl Merge for Limit {
    fn is_unset(&self) -> bool {
        self.requests_per_unit.is_unset() && self.unit.is_unset()
    }

    fn merge(&self, lower: &Self) -> Self {
        Self {
            requests_per_unit: self.requests_per_unit.merge(&lower.requests_per_unit),
            unit: self.unit.merge(&lower.unit),
        }
    }
}

impl Merge for CustomLimit {
    fn is_unset(&self) -> bool {
        self.key.is_unset() && self.value.is_unset() && self.limit.is_unset()
    }

    fn merge(&self, lower: &Self) -> Self {
        Self {
            key: self.key.merge(&lower.key),
            value: self.value.merge(&lower.value),
            limit: self.limit.merge(&lower.limit),
        }
    }
}

impl Merge for ApiPolicy {
    fn is_unset(&self) -> bool {
        self.request_interceptors.is_unset()
            && self.response_interceptors.is_unset()
            && self.backend_jwt.is_unset()
            && self.cors.is_unset()
            && self.subscription_validation.is_unset()
    }

    fn merge(&self, lower: &Self) -> Self {
        Self {
            request_interceptors: self.request_interceptors.merge(&lower.request_interceptors),
            response_interceptors: self
                .response_interceptors
                .merge(&lower.response_interceptors),
            backend_jwt: self.backend_jwt.merge(&lower.backend_jwt),
            cors: self.cors.merge(&lower.cors),
            subscription_validation: self
                .subscription_validation
                .merge(&lower.subscription_validation),
        }
    }
}

impl Merge for BackendJwtRef {
    fn is_unset(&self) -> bool {
        self.name.is_unset()
    }

    fn merge(&self, lower: &Self) -> Self {
        Self {
            name: self.name.merge(&lower.name),
        }
    }
}

impl Merge for Cors {
    fn is_unset(&self) -> bool {
        self.enabled.is_unset()
            && self.allow_credentials.is_unset()
            && self.allow_headers.is_unset()
            && self.allow_methods.is_unset()
            && self.allow_origins.is_unset()
            && self.expose_headers.is_unset()
            && self.max_age.is_unset()
    }

    fn merge(&self, lower: &Self) -> Self {
        Self {
            enabled: self.enabled.merge(&lower.enabled),
            allow_credentials: self.allow_credentials.merge(&lower.allow_credentials),
            allow_headers: self.allow_headers.merge(&lower.allow_headers),
            allow_methods: self.allow_methods.merge(&lower.allow_methods),
            allow_origins: self.allow_origins.merge(&lower.allow_origins),
            expose_headers: self.expose_headers.merge(&lower.expose_headers),
            max_age: self.max_age.merge(&lower.max_age),
        }
    }
}

impl Merge for Authentication {
    fn is_unset(&self) -> bool {
        self.disabled.is_unset()
            && self.jwt.is_unset()
            && self.api_key.is_unset()
            && self.mutual_ssl.is_unset()
    }

    fn merge(&self, lower: &Self) -> Self {
        Self {
            disabled: self.disabled.merge(&lower.disabled),
            jwt: self.jwt.merge(&lower.jwt),
            api_key: self.api_key.merge(&lower.api_key),
            mutual_ssl: self.mutual_ssl.merge(&lower.mutual_ssl),
        }
    }
}

impl Merge for Jwt {
    fn is_unset(&self) -> bool {
        self.disabled.is_unset()
            && self.header.is_unset()
            && self.send_token_to_upstream.is_unset()
            && self.audience.is_unset()
    }

    fn merge(&self, lower: &Self) -> Self {
        Self {
            disabled: self.disabled.merge(&lower.disabled),
            header: self.header.merge(&lower.header),
            send_token_to_upstream: self
                .send_token_to_upstream
                .merge(&lower.send_token_to_upstream),
            audience: self.audience.merge(&lower.audience),
        }
    }
}

impl Merge for ApiKey {
    fn is_unset(&self) -> bool {
        self.header.is_unset()
            && self.query_param.is_unset()
            && self.send_token_to_upstream.is_unset()
    }

    fn merge(&self, lower: &Self) -> Self {
        Self {
            header: self.header.merge(&lower.header),
            query_param: self.query_param.merge(&lower.query_param),
            send_token_to_upstream: self
                .send_token_to_upstream
                .merge(&lower.send_token_to_upstream),
        }
    }
}

impl Merge for MutualSsl {
    fn is_unset(&self) -> bool {
        self.disabled.is_unset() && self.required.is_unset() && self.certificates.is_unset()
    }

    fn merge(&self, lower: &Self) -> Self {
        Self {
            disabled: self.disabled.merge(&lower.disabled),
            required: self.required.merge(&lower.required),
            certificates: self.certificates.merge(&lower.certificates),
        }
    }
}
