use super::{
    gate_equal, gate_members, gate_optional, gate_versioned, record_populated, Aspects,
    Dependents, Family, InterceptorService, ResolvedBackend, ResolvedState, Versioned,
};
use crate::{
    break_tie,
    policy::{ApiPolicy, Authentication, BackendJwt, MutualSsl, RateLimit},
    Merge, PolicyAttachment, ResourceId,
};
use ahash::AHashMap as HashMap;

const PRODUCTION: &str = "Production Endpoint";
const SANDBOX: &str = "Sandbox Endpoint";
const AUTHENTICATIONS: &str = "Authentications";
const RESOURCE_AUTHENTICATIONS: &str = "Resource Authentications";
const RATE_LIMIT_POLICIES: &str = "RateLimitPolicies";
const RESOURCE_RATE_LIMIT_POLICIES: &str = "Resource RateLimitPolicies";
const API_POLICIES: &str = "APIPolicies";
const RESOURCE_API_POLICIES: &str = "Resource APIPolicies";
const INTERCEPTOR_SERVICES: &str = "Interceptor Services";
const BACKEND_JWTS: &str = "BackendJWTs";
const BACKENDS: &str = "Backend Properties";

/// The resolved configuration of an API.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiState {
    pub definition: Versioned<ApiDefinition>,
    pub production_routes: Option<Dependents<Route>>,
    pub sandbox_routes: Option<Dependents<Route>>,

    pub authentications: Dependents<PolicyAttachment<Authentication>>,
    pub resource_authentications: Dependents<PolicyAttachment<Authentication>>,
    pub rate_limit_policies: Dependents<PolicyAttachment<RateLimit>>,
    pub resource_rate_limit_policies: Dependents<PolicyAttachment<RateLimit>>,
    pub api_policies: Dependents<PolicyAttachment<ApiPolicy>>,
    pub resource_api_policies: Dependents<PolicyAttachment<ApiPolicy>>,

    pub interceptor_services: Dependents<InterceptorService>,
    pub backend_jwts: Dependents<BackendJwt>,
    pub backends: HashMap<ResourceId, ResolvedBackend>,

    pub derived: ApiDerived,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiDefinition {
    pub api_name: String,
    pub api_version: String,
    pub organization: String,
    pub base_path: String,
    pub api_type: String,
    pub production_route_refs: Vec<String>,
    pub sandbox_route_refs: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Route {
    pub hostnames: Vec<String>,
    pub rules: Vec<RouteRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteRule {
    pub matches: Vec<PathMatch>,
    /// Resource-scoped policies referenced by the rule's extension filters.
    pub policies: Vec<PolicyRef>,
    pub backends: Vec<WeightedBackend>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathMatch {
    Exact(String),
    Prefix(String),
    Regex(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyRef {
    pub kind: PolicyKind,
    pub id: ResourceId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Authentication,
    RateLimit,
    ApiPolicy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightedBackend {
    pub id: ResourceId,
    pub weight: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Environment {
    Production,
    Sandbox,
}

/// Values computed from an API's resolved groups.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApiDerived {
    pub authentication: Option<Authentication>,
    pub rate_limit: Option<RateLimit>,
    pub api_policy: Option<ApiPolicy>,
    pub resources: Vec<ResolvedResource>,
    pub subscription_validation: bool,
    pub mutual_ssl: Option<MutualSsl>,
}

/// The effective policies of one path of one route rule.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedResource {
    pub environment: Environment,
    pub route: ResourceId,
    pub rule: usize,
    pub path: PathMatch,
    pub authentication: Option<Authentication>,
    pub rate_limit: Option<RateLimit>,
    pub api_policy: Option<ApiPolicy>,
}

// === impl ApiState ===

impl ApiState {
    pub fn new(definition: Versioned<ApiDefinition>) -> Self {
        Self {
            definition,
            production_routes: None,
            sandbox_routes: None,
            authentications: Dependents::default(),
            resource_authentications: Dependents::default(),
            rate_limit_policies: Dependents::default(),
            resource_rate_limit_policies: Dependents::default(),
            api_policies: Dependents::default(),
            resource_api_policies: Dependents::default(),
            interceptor_services: Dependents::default(),
            backend_jwts: Dependents::default(),
            backends: HashMap::default(),
            derived: ApiDerived::default(),
        }
    }

    /// Recomputes the derived values from the resolved groups.
    pub fn compute_effective(&mut self) {
        let authentication = api_scoped(&self.authentications);
        let rate_limit = api_scoped(&self.rate_limit_policies);
        let api_policy = api_scoped(&self.api_policies);

        let mut resources = Vec::new();
        let partitions = [
            (Environment::Production, &self.production_routes),
            (Environment::Sandbox, &self.sandbox_routes),
        ];
        for (environment, routes) in partitions {
            let Some(routes) = routes else { continue };
            for route in routes.sorted() {
                for (idx, rule) in route.spec.rules.iter().enumerate() {
                    let resource_auth = resource_scoped(
                        &self.resource_authentications,
                        rule,
                        PolicyKind::Authentication,
                    );
                    let resource_rl = resource_scoped(
                        &self.resource_rate_limit_policies,
                        rule,
                        PolicyKind::RateLimit,
                    );
                    let resource_policy =
                        resource_scoped(&self.resource_api_policies, rule, PolicyKind::ApiPolicy);

                    let paths = if rule.matches.is_empty() {
                        vec![PathMatch::Prefix("/".to_string())]
                    } else {
                        rule.matches.clone()
                    };
                    for path in paths {
                        resources.push(ResolvedResource {
                            environment,
                            route: route.id.clone(),
                            rule: idx,
                            path,
                            authentication: PolicyAttachment::layered(
                                authentication,
                                resource_auth,
                            ),
                            rate_limit: PolicyAttachment::layered(rate_limit, resource_rl),
                            api_policy: PolicyAttachment::layered(api_policy, resource_policy),
                        });
                    }
                }
            }
        }

        let authentication = PolicyAttachment::layered(authentication, None);
        let api_policy = PolicyAttachment::layered(api_policy, None);
        self.derived = ApiDerived {
            subscription_validation: api_policy
                .as_ref()
                .map(|p| p.subscription_validation)
                .unwrap_or(false),
            mutual_ssl: authentication
                .as_ref()
                .and_then(|a| a.mutual_ssl.clone())
                .filter(|m| !m.disabled),
            rate_limit: PolicyAttachment::layered(rate_limit, None),
            authentication,
            api_policy,
            resources,
        };
    }

    /// Returns every route referenced by either partition.
    pub fn routes(&self) -> impl Iterator<Item = &Versioned<Route>> {
        self.production_routes
            .iter()
            .chain(self.sandbox_routes.iter())
            .flat_map(|routes| routes.iter())
    }
}

impl ResolvedState for ApiState {
    const FAMILY: Family = Family::Api;

    fn id(&self) -> &ResourceId {
        &self.definition.id
    }

    fn generation(&self) -> i64 {
        self.definition.generation
    }

    fn populated(&self, aspects: &mut Aspects) {
        record_populated(&self.authentications, AUTHENTICATIONS, aspects);
        record_populated(
            &self.resource_authentications,
            RESOURCE_AUTHENTICATIONS,
            aspects,
        );
        record_populated(&self.rate_limit_policies, RATE_LIMIT_POLICIES, aspects);
        record_populated(
            &self.resource_rate_limit_policies,
            RESOURCE_RATE_LIMIT_POLICIES,
            aspects,
        );
        record_populated(&self.api_policies, API_POLICIES, aspects);
        record_populated(&self.resource_api_policies, RESOURCE_API_POLICIES, aspects);
        record_populated(&self.interceptor_services, INTERCEPTOR_SERVICES, aspects);
        record_populated(&self.backend_jwts, BACKEND_JWTS, aspects);
    }

    fn reconcile(&mut self, new: Self, aspects: &mut Aspects) {
        let Self {
            definition,
            production_routes,
            sandbox_routes,
            authentications,
            resource_authentications,
            rate_limit_policies,
            resource_rate_limit_policies,
            api_policies,
            resource_api_policies,
            interceptor_services,
            backend_jwts,
            backends,
            derived,
        } = new;

        gate_versioned(
            &mut self.definition,
            definition,
            Self::FAMILY.definition_label(),
            aspects,
        );
        gate_optional(&mut self.production_routes, production_routes, PRODUCTION, aspects);
        gate_optional(&mut self.sandbox_routes, sandbox_routes, SANDBOX, aspects);
        gate_members(
            &mut self.authentications,
            authentications,
            AUTHENTICATIONS,
            aspects,
        );
        gate_members(
            &mut self.resource_authentications,
            resource_authentications,
            RESOURCE_AUTHENTICATIONS,
            aspects,
        );
        gate_members(
            &mut self.rate_limit_policies,
            rate_limit_policies,
            RATE_LIMIT_POLICIES,
            aspects,
        );
        gate_members(
            &mut self.resource_rate_limit_policies,
            resource_rate_limit_policies,
            RESOURCE_RATE_LIMIT_POLICIES,
            aspects,
        );
        gate_members(&mut self.api_policies, api_policies, API_POLICIES, aspects);
        gate_members(
            &mut self.resource_api_policies,
            resource_api_policies,
            RESOURCE_API_POLICIES,
            aspects,
        );
        gate_members(
            &mut self.interceptor_services,
            interceptor_services,
            INTERCEPTOR_SERVICES,
            aspects,
        );
        gate_members(&mut self.backend_jwts, backend_jwts, BACKEND_JWTS, aspects);
        gate_equal(&mut self.backends, backends, BACKENDS, aspects);

        if !aspects.is_empty() {
            self.derived = derived;
        }
    }
}

/// Picks the authoritative API-scoped attachment of a kind.
fn api_scoped<T>(group: &Dependents<PolicyAttachment<T>>) -> Option<&PolicyAttachment<T>> {
    break_tie(group.iter().map(|p| &p.spec))
}

/// Picks the authoritative attachment of a kind among those referenced by a route rule.
///
/// References that do not resolve to a member of the group are ignored.
fn resource_scoped<'a, T: Merge>(
    group: &'a Dependents<PolicyAttachment<T>>,
    rule: &RouteRule,
    kind: PolicyKind,
) -> Option<&'a PolicyAttachment<T>> {
    break_tie(
        rule.policies
            .iter()
            .filter(|r| r.kind == kind)
            .filter_map(|r| group.get(&r.id))
            .map(|p| &p.spec),
    )
}
