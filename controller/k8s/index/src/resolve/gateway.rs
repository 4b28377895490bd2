use super::{
    backends_reading,
    convert::{self, policy_target, versioned},
    require, Config, Resolve, ResolveError,
};
use crate::store::{Kind, Store};
use ahash::AHashSet as HashSet;
use apigw_controller_core::{
    state::{GatewayDefinition, GatewayState, Listener},
    ResourceId, Scope,
};
use apigw_controller_k8s_api::{self as k8s, gateway, NamespacedTargetRef};

impl Resolve for GatewayState {
    type Target = gateway::Gateway;

    fn resolve(
        store: &Store,
        config: &Config,
        id: &ResourceId,
    ) -> Option<Result<Self, ResolveError>> {
        let gw = store.get::<gateway::Gateway>(id)?;
        if !is_managed(store, config, &gw.spec.gateway_class_name) {
            tracing::trace!(%id, class = %gw.spec.gateway_class_name, "Ignoring unmanaged gateway");
            return None;
        }
        Some(resolve_gateway(store, id, &gw))
    }

    fn affected(store: &Store, kind: Kind, id: &ResourceId) -> Vec<ResourceId> {
        let mut gateways = HashSet::new();
        match kind {
            Kind::Gateway => {
                gateways.insert(id.clone());
            }
            Kind::GatewayClass => {
                for (gw_id, gw) in store.list::<gateway::Gateway>(None) {
                    if gw.spec.gateway_class_name == id.name {
                        gateways.insert(gw_id);
                    }
                }
            }
            Kind::ApiPolicy => {
                if let Some(policy) = store.get::<k8s::ApiPolicy>(id) {
                    attached_gateway(&policy.spec.target_ref, id, &mut gateways);
                }
            }
            Kind::RateLimitPolicy => {
                if let Some(policy) = store.get::<k8s::RateLimitPolicy>(id) {
                    attached_gateway(&policy.spec.target_ref, id, &mut gateways);
                }
            }
            Kind::TokenIssuer => {
                if let Some(issuer) = store.get::<k8s::TokenIssuer>(id) {
                    attached_gateway(&issuer.spec.target_ref, id, &mut gateways);
                }
            }
            Kind::InterceptorService => {
                for (policy_id, policy) in store.list::<k8s::ApiPolicy>(Some(id.namespace.as_str()))
                {
                    let references = policy
                        .spec
                        .layers()
                        .flat_map(|layer| layer.interceptor_names())
                        .any(|name| name == id.name);
                    if references {
                        attached_gateway(&policy.spec.target_ref, &policy_id, &mut gateways);
                    }
                }
            }
            Kind::Backend => {
                for (interceptor_id, interceptor) in
                    store.list::<k8s::InterceptorService>(Some(id.namespace.as_str()))
                {
                    if interceptor.spec.backend_ref.name == id.name {
                        gateways.extend(Self::affected(
                            store,
                            Kind::InterceptorService,
                            &interceptor_id,
                        ));
                    }
                }
            }
            Kind::Secret | Kind::ConfigMap => {
                for backend_id in backends_reading(store, kind, id) {
                    gateways.extend(Self::affected(store, Kind::Backend, &backend_id));
                }
            }
            Kind::Api
            | Kind::HttpRoute
            | Kind::Authentication
            | Kind::BackendJwt => {}
        }
        let mut gateways = gateways.into_iter().collect::<Vec<_>>();
        gateways.sort();
        gateways
    }

    fn references(&self, kind: Kind, id: &ResourceId) -> bool {
        match kind {
            Kind::Gateway => self.definition.id == *id,
            Kind::GatewayClass => self.definition.spec.class_name == id.name,
            Kind::ApiPolicy => self.api_policies.contains(id),
            Kind::RateLimitPolicy => self.rate_limit_policies.contains(id),
            Kind::TokenIssuer => self.token_issuers.contains(id),
            Kind::InterceptorService => self.interceptor_services.contains(id),
            Kind::Backend => self.backends.contains_key(id),
            Kind::Api
            | Kind::HttpRoute
            | Kind::Authentication
            | Kind::BackendJwt
            | Kind::Secret
            | Kind::ConfigMap => false,
        }
    }
}

fn is_managed(store: &Store, config: &Config, class_name: &str) -> bool {
    store
        .get::<gateway::GatewayClass>(&ResourceId::new("", class_name))
        .map_or(false, |class| class.spec.controller_name == config.controller_name)
}

fn resolve_gateway(
    store: &Store,
    id: &ResourceId,
    gw: &gateway::Gateway,
) -> Result<GatewayState, ResolveError> {
    let listeners = gw
        .spec
        .listeners
        .iter()
        .map(|l| Listener {
            name: l.name.clone(),
            hostname: l.hostname.clone(),
            port: l.port,
            protocol: l.protocol.clone(),
        })
        .collect();
    let definition = versioned(
        gw,
        id.clone(),
        GatewayDefinition {
            class_name: gw.spec.gateway_class_name.clone(),
            listeners,
        },
    );
    let mut state = GatewayState::new(definition);

    for (policy_id, policy) in store.list::<k8s::ApiPolicy>(None) {
        if targets_gateway(&policy.spec.target_ref, &policy_id, id) {
            let target = policy_target(&*policy, &policy.spec.target_ref)?;
            state.api_policies.insert(convert::attachment(
                &*policy,
                target,
                Scope::Gateway,
                policy.spec.default.as_ref(),
                policy.spec.overrides.as_ref(),
                convert::api_policy,
            ));
        }
    }
    for (policy_id, policy) in store.list::<k8s::RateLimitPolicy>(None) {
        if targets_gateway(&policy.spec.target_ref, &policy_id, id) {
            let target = policy_target(&*policy, &policy.spec.target_ref)?;
            state.rate_limit_policies.insert(convert::attachment(
                &*policy,
                target,
                Scope::Gateway,
                policy.spec.default.as_ref(),
                policy.spec.overrides.as_ref(),
                convert::rate_limit,
            ));
        }
    }
    for (issuer_id, issuer) in store.list::<k8s::TokenIssuer>(None) {
        if targets_gateway(&issuer.spec.target_ref, &issuer_id, id) {
            policy_target(&*issuer, &issuer.spec.target_ref)?;
            state.token_issuers.insert(versioned(
                &*issuer,
                issuer_id,
                convert::token_issuer(&issuer.spec),
            ));
        }
    }

    // Interceptors are looked up in the namespace of the policy that names them.
    let interceptors = state
        .api_policies
        .iter()
        .flat_map(|p| {
            let namespace = p.id.namespace.clone();
            p.spec
                .default
                .iter()
                .chain(p.spec.overrides.iter())
                .flat_map(|layer| {
                    layer
                        .request_interceptors
                        .iter()
                        .chain(layer.response_interceptors.iter())
                })
                .map(move |name| ResourceId::new(namespace.clone(), name.clone()))
        })
        .collect::<Vec<_>>();
    for interceptor_id in interceptors {
        if state.interceptor_services.contains(&interceptor_id) {
            continue;
        }
        let interceptor = require::<k8s::InterceptorService>(store, interceptor_id.clone())?;
        let spec = convert::interceptor(&interceptor_id.namespace, &interceptor.spec);
        let backend_id = spec.backend.clone();
        state
            .interceptor_services
            .insert(versioned(&*interceptor, interceptor_id, spec));

        if !state.backends.contains_key(&backend_id) {
            let backend = require::<k8s::Backend>(store, backend_id.clone())?;
            let resolved = convert::backend(store, &backend_id, &backend)?;
            state.backends.insert(backend_id, resolved);
        }
    }

    state.compute_effective();
    Ok(state)
}

fn targets_gateway(
    target_ref: &NamespacedTargetRef,
    policy_id: &ResourceId,
    gateway: &ResourceId,
) -> bool {
    target_ref.targets_kind::<gateway::Gateway>()
        && target_ref.name == gateway.name
        && target_ref.namespace_or(&policy_id.namespace) == gateway.namespace
}

fn attached_gateway(
    target_ref: &NamespacedTargetRef,
    policy_id: &ResourceId,
    gateways: &mut HashSet<ResourceId>,
) {
    if target_ref.targets_kind::<gateway::Gateway>() {
        gateways.insert(ResourceId::new(
            target_ref.namespace_or(&policy_id.namespace),
            target_ref.name.clone(),
        ));
    }
}
