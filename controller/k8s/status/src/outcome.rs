//! Status updates acknowledging applied deployments.

use crate::{Target, Update};
use apigw_controller_core::{Family, Outcome, OutcomeKind, ResourceId};
use apigw_controller_k8s_api::{ApiStatus, Condition, DeploymentStatus, Time};
use chrono::{DateTime, SecondsFormat, Utc};

/// The number of timestamped events kept in an API's status.
const MAX_EVENTS: usize = 10;

const ACCEPTED: &str = "Accepted";
const RECONCILED: &str = "Reconciled";

/// Builds the status update acknowledging an applied lifecycle event.
pub fn outcome_update(outcome: &Outcome, now: DateTime<Utc>) -> Update {
    match outcome.family {
        Family::Api => api_update(outcome.id.clone(), outcome.kind, &outcome.aspects, now),
        Family::Gateway => gateway_update(outcome.id.clone(), outcome.kind, &outcome.aspects, now),
    }
}

pub fn api_update(
    id: ResourceId,
    kind: OutcomeKind,
    aspects: &[&'static str],
    now: DateTime<Utc>,
) -> Update {
    let (state, message) = match kind {
        OutcomeKind::Create => ("Deployed", "API is deployed to the gateway.".to_string()),
        OutcomeKind::Update => (
            "Updated",
            format!(
                "API update is deployed to the gateway. [{}] Updated",
                aspects.join(" ")
            ),
        ),
    };
    let event = format!(
        "[{}] {message}",
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    let target = Target {
        family: Family::Api,
        id,
    };
    Update::new(target, move |current| {
        let mut status = if current.status.is_null() {
            ApiStatus::default()
        } else {
            serde_json::from_value::<ApiStatus>(current.status.clone())?
        };
        let mut events = status
            .deployment_status
            .take()
            .map(|d| d.events)
            .unwrap_or_default();
        events.push(event.clone());
        if events.len() > MAX_EVENTS {
            events.drain(..events.len() - MAX_EVENTS);
        }
        status.deployment_status = Some(DeploymentStatus {
            status: state.to_string(),
            message: message.clone(),
            accepted: true,
            transition_time: Some(Time(now)),
            events,
        });
        serde_json::to_value(status)
    })
}

pub fn gateway_update(
    id: ResourceId,
    kind: OutcomeKind,
    aspects: &[&'static str],
    now: DateTime<Utc>,
) -> Update {
    let message = match kind {
        OutcomeKind::Create => "Gateway is deployed successfully".to_string(),
        OutcomeKind::Update => format!(
            "Gateway update is deployed successfully. [{}] Updated",
            aspects.join(" ")
        ),
    };

    let target = Target {
        family: Family::Gateway,
        id,
    };
    Update::new(target, move |current| {
        let mut status = match &current.status {
            serde_json::Value::Object(_) => current.status.clone(),
            _ => serde_json::json!({}),
        };
        let mut conditions = match status.get("conditions") {
            Some(conditions) if !conditions.is_null() => {
                serde_json::from_value::<Vec<Condition>>(conditions.clone())?
            }
            _ => Vec::new(),
        };

        let accepted = Condition {
            type_: ACCEPTED.to_string(),
            status: "True".to_string(),
            reason: RECONCILED.to_string(),
            message: message.clone(),
            last_transition_time: Time(now),
            observed_generation: current.generation,
        };
        match conditions.iter_mut().find(|c| c.type_ == ACCEPTED) {
            Some(condition) => *condition = accepted,
            None => conditions.insert(0, accepted),
        }
        for condition in &mut conditions {
            condition.observed_generation = current.generation;
        }

        status["conditions"] = serde_json::to_value(conditions)?;
        Ok(status)
    })
}
