use super::{
    gate_equal, gate_members, gate_versioned, record_populated, Aspects, Dependents, Family,
    InterceptorService, ResolvedBackend, ResolvedState, TokenIssuer, Versioned,
};
use crate::{
    break_tie,
    policy::{ApiPolicy, CustomLimit, RateLimit},
    PolicyAttachment, ResourceId,
};
use ahash::AHashMap as HashMap;

const API_POLICIES: &str = "APIPolicies";
const INTERCEPTOR_SERVICES: &str = "Interceptor Services";
const RATE_LIMIT_POLICIES: &str = "RateLimitPolicies";
const TOKEN_ISSUERS: &str = "TokenIssuers";
const BACKENDS: &str = "Backend Properties";

/// The resolved configuration of a gateway.
#[derive(Clone, Debug, PartialEq)]
pub struct GatewayState {
    pub definition: Versioned<GatewayDefinition>,
    pub api_policies: Dependents<PolicyAttachment<ApiPolicy>>,
    pub interceptor_services: Dependents<InterceptorService>,
    pub rate_limit_policies: Dependents<PolicyAttachment<RateLimit>>,
    pub token_issuers: Dependents<TokenIssuer>,
    pub backends: HashMap<ResourceId, ResolvedBackend>,
    pub derived: GatewayDerived,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayDefinition {
    pub class_name: String,
    pub listeners: Vec<Listener>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Listener {
    pub name: String,
    pub hostname: Option<String>,
    pub port: u16,
    pub protocol: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GatewayDerived {
    pub api_policy: Option<ApiPolicy>,
    /// Custom limits, ordered by the identity of the policy declaring them.
    pub custom_rate_limits: Vec<CustomLimit>,
}

// === impl GatewayState ===

impl GatewayState {
    pub fn new(definition: Versioned<GatewayDefinition>) -> Self {
        Self {
            definition,
            api_policies: Dependents::default(),
            interceptor_services: Dependents::default(),
            rate_limit_policies: Dependents::default(),
            token_issuers: Dependents::default(),
            backends: HashMap::default(),
            derived: GatewayDerived::default(),
        }
    }

    pub fn compute_effective(&mut self) {
        let api_policy = break_tie(self.api_policies.iter().map(|p| &p.spec));
        let custom_rate_limits = self
            .rate_limit_policies
            .sorted()
            .into_iter()
            .filter_map(|p| PolicyAttachment::layered(Some(&p.spec), None))
            .filter_map(|rl| rl.custom)
            .collect();
        self.derived = GatewayDerived {
            api_policy: PolicyAttachment::layered(api_policy, None),
            custom_rate_limits,
        };
    }
}

impl ResolvedState for GatewayState {
    const FAMILY: Family = Family::Gateway;

    fn id(&self) -> &ResourceId {
        &self.definition.id
    }

    fn generation(&self) -> i64 {
        self.definition.generation
    }

    fn populated(&self, aspects: &mut Aspects) {
        record_populated(&self.api_policies, API_POLICIES, aspects);
        record_populated(&self.interceptor_services, INTERCEPTOR_SERVICES, aspects);
        record_populated(&self.rate_limit_policies, RATE_LIMIT_POLICIES, aspects);
        record_populated(&self.token_issuers, TOKEN_ISSUERS, aspects);
    }

    fn reconcile(&mut self, new: Self, aspects: &mut Aspects) {
        let Self {
            definition,
            api_policies,
            interceptor_services,
            rate_limit_policies,
            token_issuers,
            backends,
            derived,
        } = new;

        gate_versioned(
            &mut self.definition,
            definition,
            Self::FAMILY.definition_label(),
            aspects,
        );
        gate_members(&mut self.api_policies, api_policies, API_POLICIES, aspects);
        gate_members(
            &mut self.interceptor_services,
            interceptor_services,
            INTERCEPTOR_SERVICES,
            aspects,
        );
        gate_members(
            &mut self.rate_limit_policies,
            rate_limit_policies,
            RATE_LIMIT_POLICIES,
            aspects,
        );
        gate_members(&mut self.token_issuers, token_issuers, TOKEN_ISSUERS, aspects);
        gate_equal(&mut self.backends, backends, BACKENDS, aspects);

        if !aspects.is_empty() {
            self.derived = derived;
        }
    }
}
