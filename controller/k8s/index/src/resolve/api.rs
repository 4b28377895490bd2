use super::{
    backends_reading,
    convert::{self, policy_target, versioned},
    require, Config, Resolve, ResolveError,
};
use crate::store::{Kind, Store};
use ahash::AHashSet as HashSet;
use apigw_controller_core::{
    state::{ApiDefinition, ApiState, Dependents, PolicyKind, Route},
    ResourceId, Scope,
};
use apigw_controller_k8s_api::{self as k8s, api::EnvConfig, gateway};

impl Resolve for ApiState {
    type Target = k8s::Api;

    fn resolve(store: &Store, _: &Config, id: &ResourceId) -> Option<Result<Self, ResolveError>> {
        let api = store.get::<k8s::Api>(id)?;
        Some(resolve_api(store, id, &api))
    }

    fn affected(store: &Store, kind: Kind, id: &ResourceId) -> Vec<ResourceId> {
        let mut apis = HashSet::new();
        affected_apis(store, kind, id, &mut apis);
        let mut apis = apis.into_iter().collect::<Vec<_>>();
        apis.sort();
        apis
    }

    fn references(&self, kind: Kind, id: &ResourceId) -> bool {
        match kind {
            Kind::Api => self.definition.id == *id,
            Kind::HttpRoute => self.routes().any(|r| r.id == *id),
            Kind::Authentication => {
                self.authentications.contains(id) || self.resource_authentications.contains(id)
            }
            Kind::RateLimitPolicy => {
                self.rate_limit_policies.contains(id)
                    || self.resource_rate_limit_policies.contains(id)
            }
            Kind::ApiPolicy => {
                self.api_policies.contains(id) || self.resource_api_policies.contains(id)
            }
            Kind::Backend => self.backends.contains_key(id),
            Kind::InterceptorService => self.interceptor_services.contains(id),
            Kind::BackendJwt => self.backend_jwts.contains(id),
            // Secrets and config maps are found through the backends that read them.
            Kind::Gateway
            | Kind::GatewayClass
            | Kind::TokenIssuer
            | Kind::Secret
            | Kind::ConfigMap => false,
        }
    }
}

fn resolve_api(store: &Store, id: &ResourceId, api: &k8s::Api) -> Result<ApiState, ResolveError> {
    let spec = &api.spec;
    if spec.route_refs().next().is_none() {
        return Err(ResolveError::InvalidDefinition {
            kind: Kind::Api,
            id: id.clone(),
            reason: "no production or sandbox routes".to_string(),
        });
    }

    let definition = versioned(
        api,
        id.clone(),
        ApiDefinition {
            api_name: spec.api_name.clone(),
            api_version: spec.api_version.clone(),
            organization: spec.organization.clone(),
            base_path: spec.base_path.clone(),
            api_type: spec.api_type.clone(),
            production_route_refs: route_names(&spec.production),
            sandbox_route_refs: route_names(&spec.sandbox),
        },
    );
    let mut state = ApiState::new(definition);
    state.production_routes = partition(store, &id.namespace, &spec.production)?;
    state.sandbox_routes = partition(store, &id.namespace, &spec.sandbox)?;

    // Policies attached to the API itself.
    for (policy_id, policy) in store.list::<k8s::Authentication>(None) {
        if targets_api(&policy.spec.target_ref, &policy_id, id) {
            let target = policy_target(&*policy, &policy.spec.target_ref)?;
            state.authentications.insert(convert::attachment(
                &*policy,
                target,
                Scope::Api,
                policy.spec.default.as_ref(),
                policy.spec.overrides.as_ref(),
                convert::authentication,
            ));
        }
    }
    for (policy_id, policy) in store.list::<k8s::RateLimitPolicy>(None) {
        if targets_api(&policy.spec.target_ref, &policy_id, id) {
            let target = policy_target(&*policy, &policy.spec.target_ref)?;
            state.rate_limit_policies.insert(convert::attachment(
                &*policy,
                target,
                Scope::Api,
                policy.spec.default.as_ref(),
                policy.spec.overrides.as_ref(),
                convert::rate_limit,
            ));
        }
    }
    for (policy_id, policy) in store.list::<k8s::ApiPolicy>(None) {
        if targets_api(&policy.spec.target_ref, &policy_id, id) {
            let target = policy_target(&*policy, &policy.spec.target_ref)?;
            state.api_policies.insert(convert::attachment(
                &*policy,
                target,
                Scope::Api,
                policy.spec.default.as_ref(),
                policy.spec.overrides.as_ref(),
                convert::api_policy,
            ));
        }
    }

    // Policies referenced by route rules. References to policies that do not exist (yet) are
    // skipped.
    let references = state
        .routes()
        .flat_map(|route| {
            route.spec.rules.iter().flat_map(move |rule| {
                rule.policies
                    .iter()
                    .map(move |policy| (route.id.clone(), policy.clone()))
            })
        })
        .collect::<Vec<_>>();
    for (route, reference) in references {
        match reference.kind {
            PolicyKind::Authentication => {
                if let Some(policy) = store.get::<k8s::Authentication>(&reference.id) {
                    state.resource_authentications.insert(convert::attachment(
                        &*policy,
                        route,
                        Scope::Resource,
                        policy.spec.default.as_ref(),
                        policy.spec.overrides.as_ref(),
                        convert::authentication,
                    ));
                }
            }
            PolicyKind::RateLimit => {
                if let Some(policy) = store.get::<k8s::RateLimitPolicy>(&reference.id) {
                    state.resource_rate_limit_policies.insert(convert::attachment(
                        &*policy,
                        route,
                        Scope::Resource,
                        policy.spec.default.as_ref(),
                        policy.spec.overrides.as_ref(),
                        convert::rate_limit,
                    ));
                }
            }
            PolicyKind::ApiPolicy => {
                if let Some(policy) = store.get::<k8s::ApiPolicy>(&reference.id) {
                    state.resource_api_policies.insert(convert::attachment(
                        &*policy,
                        route,
                        Scope::Resource,
                        policy.spec.default.as_ref(),
                        policy.spec.overrides.as_ref(),
                        convert::api_policy,
                    ));
                }
            }
        }
    }

    // Services referenced by API policies at either scope.
    let policies = state
        .api_policies
        .iter()
        .chain(state.resource_api_policies.iter())
        .flat_map(|p| p.spec.default.iter().chain(p.spec.overrides.iter()))
        .cloned()
        .collect::<Vec<_>>();
    for policy in &policies {
        for name in policy
            .request_interceptors
            .iter()
            .chain(policy.response_interceptors.iter())
        {
            let interceptor_id = ResourceId::new(id.namespace.clone(), name.clone());
            if state.interceptor_services.contains(&interceptor_id) {
                continue;
            }
            let interceptor = require::<k8s::InterceptorService>(store, interceptor_id.clone())?;
            let spec = convert::interceptor(&id.namespace, &interceptor.spec);
            state
                .interceptor_services
                .insert(versioned(&*interceptor, interceptor_id, spec));
        }
        if let Some(jwt) = &policy.backend_jwt {
            let jwt_id = ResourceId::new(id.namespace.clone(), jwt.name.clone());
            if state.backend_jwts.contains(&jwt_id) {
                continue;
            }
            let backend_jwt = require::<k8s::BackendJwt>(store, jwt_id.clone())?;
            state.backend_jwts.insert(versioned(
                &*backend_jwt,
                jwt_id,
                convert::backend_jwt(&backend_jwt.spec),
            ));
        }
    }

    // Backends of routes and interceptors.
    let backend_ids = state
        .routes()
        .flat_map(|r| r.spec.rules.iter())
        .flat_map(|rule| rule.backends.iter().map(|b| b.id.clone()))
        .chain(state.interceptor_services.iter().map(|i| i.spec.backend.clone()))
        .collect::<Vec<_>>();
    for backend_id in backend_ids {
        if state.backends.contains_key(&backend_id) {
            continue;
        }
        let backend = require::<k8s::Backend>(store, backend_id.clone())?;
        let resolved = convert::backend(store, &backend_id, &backend)?;
        state.backends.insert(backend_id, resolved);
    }

    state.compute_effective();
    Ok(state)
}

fn route_names(envs: &[EnvConfig]) -> Vec<String> {
    envs.iter().flat_map(|env| env.route_refs.iter().cloned()).collect()
}

/// Resolves the routes of one environment. An environment without route references is absent.
fn partition(
    store: &Store,
    namespace: &str,
    envs: &[EnvConfig],
) -> Result<Option<Dependents<Route>>, ResolveError> {
    let names = route_names(envs);
    if names.is_empty() {
        return Ok(None);
    }
    let mut routes = Dependents::default();
    for name in names {
        let route_id = ResourceId::new(namespace, name);
        let route = require::<gateway::HttpRoute>(store, route_id.clone())?;
        routes.insert(versioned(&*route, route_id, convert::route(&route)?));
    }
    Ok(Some(routes))
}

fn targets_api(
    target_ref: &k8s::NamespacedTargetRef,
    policy_id: &ResourceId,
    api: &ResourceId,
) -> bool {
    target_ref.targets_kind::<k8s::Api>()
        && target_ref.name == api.name
        && target_ref.namespace_or(&policy_id.namespace) == api.namespace
}

/// Collects the APIs that depend on a resource as it is currently stored.
fn affected_apis(store: &Store, kind: Kind, id: &ResourceId, apis: &mut HashSet<ResourceId>) {
    match kind {
        Kind::Api => {
            apis.insert(id.clone());
        }

        Kind::HttpRoute => {
            for (api_id, api) in store.list::<k8s::Api>(Some(id.namespace.as_str())) {
                if api.spec.route_refs().any(|r| r == id.name) {
                    apis.insert(api_id);
                }
            }
        }

        Kind::Authentication => {
            if let Some(policy) = store.get::<k8s::Authentication>(id) {
                attached_api(&policy.spec.target_ref, id, apis);
            }
            referencing_routes(store, id, PolicyKind::Authentication, apis);
        }
        Kind::RateLimitPolicy => {
            if let Some(policy) = store.get::<k8s::RateLimitPolicy>(id) {
                attached_api(&policy.spec.target_ref, id, apis);
            }
            referencing_routes(store, id, PolicyKind::RateLimit, apis);
        }
        Kind::ApiPolicy => {
            if let Some(policy) = store.get::<k8s::ApiPolicy>(id) {
                attached_api(&policy.spec.target_ref, id, apis);
            }
            referencing_routes(store, id, PolicyKind::ApiPolicy, apis);
        }

        Kind::InterceptorService => {
            for (policy_id, policy) in store.list::<k8s::ApiPolicy>(Some(id.namespace.as_str())) {
                let references = policy
                    .spec
                    .layers()
                    .flat_map(|layer| layer.interceptor_names())
                    .any(|name| name == id.name);
                if references {
                    affected_apis(store, Kind::ApiPolicy, &policy_id, apis);
                }
            }
        }
        Kind::BackendJwt => {
            for (policy_id, policy) in store.list::<k8s::ApiPolicy>(Some(id.namespace.as_str())) {
                let references = policy
                    .spec
                    .layers()
                    .filter_map(|layer| layer.backend_jwt_policy.as_ref())
                    .any(|r| r.name == id.name);
                if references {
                    affected_apis(store, Kind::ApiPolicy, &policy_id, apis);
                }
            }
        }

        Kind::Backend => {
            for (route_id, route) in store.list::<gateway::HttpRoute>(None) {
                let references = convert::route(&route).map_or(false, |route| {
                    route
                        .rules
                        .iter()
                        .flat_map(|rule| rule.backends.iter())
                        .any(|b| b.id == *id)
                });
                if references {
                    affected_apis(store, Kind::HttpRoute, &route_id, apis);
                }
            }
            for (interceptor_id, interceptor) in
                store.list::<k8s::InterceptorService>(Some(id.namespace.as_str()))
            {
                if interceptor.spec.backend_ref.name == id.name {
                    affected_apis(store, Kind::InterceptorService, &interceptor_id, apis);
                }
            }
        }

        Kind::Secret | Kind::ConfigMap => {
            for backend_id in backends_reading(store, kind, id) {
                affected_apis(store, Kind::Backend, &backend_id, apis);
            }
        }

        Kind::Gateway | Kind::GatewayClass | Kind::TokenIssuer => {}
    }
}

fn attached_api(
    target_ref: &k8s::NamespacedTargetRef,
    policy_id: &ResourceId,
    apis: &mut HashSet<ResourceId>,
) {
    if target_ref.targets_kind::<k8s::Api>() {
        apis.insert(ResourceId::new(
            target_ref.namespace_or(&policy_id.namespace),
            target_ref.name.clone(),
        ));
    }
}

/// Collects the APIs whose routes reference a policy through an extension filter.
fn referencing_routes(
    store: &Store,
    policy: &ResourceId,
    kind: PolicyKind,
    apis: &mut HashSet<ResourceId>,
) {
    for (route_id, route) in store.list::<gateway::HttpRoute>(Some(policy.namespace.as_str())) {
        let references = route
            .spec
            .rules
            .iter()
            .flatten()
            .flat_map(|rule| rule.filters.iter().flatten())
            .any(|filter| match filter {
                gateway::HttpRouteFilter::ExtensionRef { extension_ref } => {
                    extension_ref.name == policy.name
                        && convert::policy_kind(&extension_ref.group, &extension_ref.kind)
                            == Some(kind)
                }
                _ => false,
            });
        if references {
            affected_apis(store, Kind::HttpRoute, &route_id, apis);
        }
    }
}
