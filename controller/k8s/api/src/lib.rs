#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod api;
pub mod api_policy;
pub mod authentication;
pub mod backend;
pub mod backend_jwt;
pub mod interceptor_service;
pub mod rate_limit_policy;
mod target_ref;
pub mod token_issuer;

pub use self::{
    api::{Api, ApiSpec, ApiStatus, DeploymentStatus},
    api_policy::{ApiPolicy, ApiPolicySpec},
    authentication::{Authentication, AuthenticationSpec},
    backend::{Backend, BackendSpec},
    backend_jwt::{BackendJwt, BackendJwtSpec},
    interceptor_service::{InterceptorService, InterceptorServiceSpec},
    rate_limit_policy::{RateLimitPolicy, RateLimitPolicySpec},
    target_ref::NamespacedTargetRef,
    token_issuer::{TokenIssuer, TokenIssuerSpec},
};
pub use k8s_gateway_api as gateway;
pub use k8s_openapi::{
    api::core::v1::{ConfigMap, Secret},
    apimachinery::pkg::apis::meta::v1::{Condition, Time},
    ByteString,
};
pub use kube::{
    api::{ObjectMeta, ResourceExt},
    Resource,
};

/// The API group of the gateway's custom resources.
pub const GROUP: &str = "dp.apigw.io";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resources_are_named_for_their_kinds() {
        assert_eq!(Api::kind(&()), "API");
        assert_eq!(ApiPolicy::kind(&()), "APIPolicy");
        assert_eq!(BackendJwt::kind(&()), "BackendJWT");
        assert_eq!(Backend::kind(&()), "Backend");
        assert_eq!(Api::group(&()), GROUP);
        assert_eq!(Api::api_version(&()), "dp.apigw.io/v1alpha1");
    }
}
