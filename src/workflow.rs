//! Capture workflow: the session state machine.
//!
//! Phases run strictly AddressEntry → PropertyDrawing → ExclusionsDrawing →
//! Result, and only `restart` leads back. Calls that are not valid in the
//! current phase are rejected with a `WorkflowError` before anything is
//! mutated.
//!
//! External lookups are split into `begin_*` / `complete_*` pairs so a caller
//! can run them concurrently with the rest of its UI. Every request carries a
//! ticket naming the phase and session epoch that issued it; a response whose
//! ticket is not the outstanding one for its kind is discarded as stale.

use crate::config::EstimatorConfig;
use crate::domain::{AreaResult, CallKind, Phase, Polygon, SessionState};
use crate::error::{LookupError, LookupResult, WorkflowError, WorkflowResult};
use crate::services::{
    report_square_feet, BuildingDataClient, FootprintEstimate, FootprintEstimator, GeometryEngine,
    Located, Locator,
};
use std::collections::HashMap;

/// Shown when the address could not be matched
pub const NOT_FOUND_MESSAGE: &str =
    "Address not found. Try a more specific address or use the autocomplete suggestions.";

/// Shown when the lookup itself failed
pub const LOOKUP_FAILED_MESSAGE: &str = "Could not look up that address. Please try again later.";

/// Tunables of the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Shorter address queries are not dispatched
    pub min_query_len: usize,
    /// Mowing rate for the time estimate
    pub sq_ft_per_minute: u64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            min_query_len: 3,
            sq_ft_per_minute: 250,
        }
    }
}

impl From<&EstimatorConfig> for WorkflowSettings {
    fn from(config: &EstimatorConfig) -> Self {
        Self {
            min_query_len: config.geocode.min_query_len,
            sq_ft_per_minute: config.estimate.sq_ft_per_minute,
        }
    }
}

/// Identifies one in-flight external call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    kind: CallKind,
    phase: Phase,
    epoch: u64,
    sequence: u64,
}

impl RequestTicket {
    /// Kind of call this ticket was issued for
    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// Phase that issued the call
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// Address lookup to dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct LocateRequest {
    pub ticket: RequestTicket,
    pub query: String,
}

/// Building survey to dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRequest {
    pub ticket: RequestTicket,
    pub property: Polygon,
    pub exclusion: Option<Polygon>,
}

/// How an address lookup ended for the session
#[derive(Debug, Clone, PartialEq)]
pub enum LocateOutcome {
    /// Resolved; the session moved to property drawing
    Located(Located),
    /// Not resolved; the session stays in address entry
    Retry { message: String },
    /// The session moved on before the response arrived
    Stale,
}

/// How a building survey ended for the session
#[derive(Debug, Clone, PartialEq)]
pub enum SurveyOutcome {
    Estimated(FootprintEstimate),
    Stale,
}

/// Owns one estimation session and drives it through its phases
#[derive(Debug, Clone)]
pub struct CaptureWorkflow {
    session: SessionState,
    epoch: u64,
    sequence: u64,
    /// Outstanding request per kind, by issue sequence
    pending: HashMap<CallKind, u64>,
    message: Option<String>,
    engine: GeometryEngine,
    settings: WorkflowSettings,
}

impl Default for CaptureWorkflow {
    fn default() -> Self {
        Self::new(GeometryEngine::new(), WorkflowSettings::default())
    }
}

impl CaptureWorkflow {
    /// Start a new session in address entry
    pub fn new(engine: GeometryEngine, settings: WorkflowSettings) -> Self {
        Self {
            session: SessionState::default(),
            epoch: 0,
            sequence: 0,
            pending: HashMap::new(),
            message: None,
            engine,
            settings,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    /// Read-only view of the session
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Latest user-facing message, if any
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Check whether a call of this kind is in flight
    pub fn is_pending(&self, kind: CallKind) -> bool {
        self.pending.contains_key(&kind)
    }

    /// The reported estimate, available in the result phase only
    pub fn result(&self) -> Option<AreaResult> {
        match (self.session.phase, self.session.final_area_sq_ft) {
            (Phase::Result, Some(area)) => Some(AreaResult::new(area, self.settings.sq_ft_per_minute)),
            _ => None,
        }
    }

    fn require_phase(&self, operation: &'static str, phase: Phase) -> WorkflowResult<()> {
        if self.session.phase == phase {
            Ok(())
        } else {
            Err(WorkflowError::WrongPhase {
                operation,
                phase: self.session.phase,
            })
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::info!("Capture workflow: {} -> {}", self.session.phase, phase);
        self.session.phase = phase;
        self.epoch += 1;
        self.pending.clear();
    }

    fn issue(&mut self, kind: CallKind) -> WorkflowResult<RequestTicket> {
        if self.pending.contains_key(&kind) {
            return Err(WorkflowError::AlreadyPending(kind));
        }
        self.sequence += 1;
        self.pending.insert(kind, self.sequence);
        Ok(RequestTicket {
            kind,
            phase: self.session.phase,
            epoch: self.epoch,
            sequence: self.sequence,
        })
    }

    /// Settle a ticket; `false` if its response must be discarded.
    ///
    /// Only the outstanding request of its kind settles, and only once.
    fn settle(&mut self, ticket: &RequestTicket) -> bool {
        let outstanding = self.pending.get(&ticket.kind) == Some(&ticket.sequence);
        if !outstanding || ticket.epoch != self.epoch || ticket.phase != self.session.phase {
            tracing::warn!(
                "Discarding stale {} response issued during {}",
                ticket.kind,
                ticket.phase
            );
            return false;
        }
        self.pending.remove(&ticket.kind);
        true
    }

    /// Start an address lookup.
    ///
    /// Returns `None` when the query is too short to dispatch; a message is
    /// left for the user and nothing else changes.
    pub fn begin_locate(&mut self, address: &str) -> WorkflowResult<Option<LocateRequest>> {
        self.require_phase("address lookup", Phase::AddressEntry)?;
        let query = address.trim();
        if query.chars().count() < self.settings.min_query_len {
            self.message = Some(format!(
                "Enter at least {} characters of the address.",
                self.settings.min_query_len
            ));
            return Ok(None);
        }

        let ticket = self.issue(CallKind::Geocode)?;
        Ok(Some(LocateRequest {
            ticket,
            query: query.to_string(),
        }))
    }

    /// Apply the response of an address lookup
    pub fn complete_locate(
        &mut self,
        ticket: RequestTicket,
        response: LookupResult<Located>,
    ) -> LocateOutcome {
        if !self.settle(&ticket) {
            return LocateOutcome::Stale;
        }

        match response {
            Ok(located) => {
                tracing::info!("Located {:?} at {}", located.address, located.coordinate);
                self.session.address = Some(located.address.clone());
                self.session.focus = Some(located.coordinate);
                self.message = None;
                self.enter(Phase::PropertyDrawing);
                LocateOutcome::Located(located)
            }
            Err(e) => {
                tracing::warn!("Address lookup failed: {}", e);
                let message = match e {
                    LookupError::NotFound => NOT_FOUND_MESSAGE,
                    LookupError::Transport(_) | LookupError::InvalidResponse(_) => {
                        LOOKUP_FAILED_MESSAGE
                    }
                };
                self.message = Some(message.to_string());
                LocateOutcome::Retry {
                    message: message.to_string(),
                }
            }
        }
    }

    /// Look up an address and apply the result
    pub async fn locate(&mut self, locator: &Locator, address: &str) -> WorkflowResult<LocateOutcome> {
        let Some(request) = self.begin_locate(address)? else {
            return Ok(LocateOutcome::Retry {
                message: self.message.clone().unwrap_or_default(),
            });
        };
        let response = locator.locate(&request.query).await;
        Ok(self.complete_locate(request.ticket, response))
    }

    /// Replace the property boundary
    pub fn set_property(&mut self, polygon: Polygon) -> WorkflowResult<()> {
        self.require_phase("drawing the property", Phase::PropertyDrawing)?;
        self.session.property_polygon = Some(polygon);
        Ok(())
    }

    /// Remove the property boundary
    pub fn clear_property(&mut self) -> WorkflowResult<()> {
        self.require_phase("clearing the property", Phase::PropertyDrawing)?;
        self.session.property_polygon = None;
        Ok(())
    }

    /// Save the property area and move on to exclusions.
    ///
    /// The polygons and final area are cleared; only the saved square
    /// footage carries forward.
    pub fn advance_to_exclusions(&mut self) -> WorkflowResult<u64> {
        self.require_phase("advancing to exclusions", Phase::PropertyDrawing)?;
        let property = self
            .session
            .property_polygon
            .as_ref()
            .ok_or(WorkflowError::MissingProperty)?;

        let area_sq_ft = report_square_feet(self.engine.area(property));
        tracing::info!("Property area saved: {} sq ft", area_sq_ft);

        self.session.property_area_sq_ft = Some(area_sq_ft);
        self.session.property_polygon = None;
        self.session.exclusion_polygon = None;
        self.session.final_area_sq_ft = None;
        self.enter(Phase::ExclusionsDrawing);
        Ok(area_sq_ft)
    }

    /// Replace the exclusion shape
    pub fn set_exclusion(&mut self, polygon: Polygon) -> WorkflowResult<()> {
        self.require_phase("drawing an exclusion", Phase::ExclusionsDrawing)?;
        self.session.exclusion_polygon = Some(polygon);
        Ok(())
    }

    /// Remove the exclusion shape
    pub fn clear_exclusion(&mut self) -> WorkflowResult<()> {
        self.require_phase("clearing the exclusion", Phase::ExclusionsDrawing)?;
        self.session.exclusion_polygon = None;
        Ok(())
    }

    /// Subtract the exclusion area from the saved property area and report
    pub fn advance_to_result(&mut self) -> WorkflowResult<AreaResult> {
        self.require_phase("advancing to the result", Phase::ExclusionsDrawing)?;
        let property_sq_ft = self
            .session
            .property_area_sq_ft
            .ok_or(WorkflowError::MissingProperty)?;

        let exclusion_sq_ft = self
            .session
            .exclusion_polygon
            .as_ref()
            .map(|p| report_square_feet(self.engine.area(p)))
            .unwrap_or(0);
        if exclusion_sq_ft > property_sq_ft {
            tracing::debug!(
                "Exclusion ({} sq ft) exceeds property ({} sq ft); clamping to zero",
                exclusion_sq_ft,
                property_sq_ft
            );
        }

        let final_sq_ft = property_sq_ft.saturating_sub(exclusion_sq_ft);
        self.session.final_area_sq_ft = Some(final_sq_ft);
        self.enter(Phase::Result);

        let result = AreaResult::new(final_sq_ft, self.settings.sq_ft_per_minute);
        tracing::info!("Final lawn area: {}", result);
        Ok(result)
    }

    /// Discard the session and return to address entry
    pub fn restart(&mut self) {
        self.enter(Phase::AddressEntry);
        self.session = SessionState::default();
        self.message = None;
    }

    /// Start a building-subtraction survey of the current property polygon.
    ///
    /// Exclusions are drawn only after the property is saved, so the caller
    /// supplies the exclusion to subtract ahead of the buildings.
    pub fn begin_building_survey(
        &mut self,
        exclusion: Option<Polygon>,
    ) -> WorkflowResult<SurveyRequest> {
        self.require_phase("surveying buildings", Phase::PropertyDrawing)?;
        let property = self
            .session
            .property_polygon
            .clone()
            .ok_or(WorkflowError::MissingProperty)?;

        let ticket = self.issue(CallKind::Buildings)?;
        Ok(SurveyRequest {
            ticket,
            property,
            exclusion,
        })
    }

    /// Accept a survey result unless the session has moved on.
    ///
    /// The estimate is handed back to the caller and never replaces the
    /// session's own figures.
    pub fn complete_building_survey(
        &mut self,
        ticket: RequestTicket,
        estimate: FootprintEstimate,
    ) -> SurveyOutcome {
        if !self.settle(&ticket) {
            return SurveyOutcome::Stale;
        }
        SurveyOutcome::Estimated(estimate)
    }

    /// Survey buildings around the current property and apply the result
    pub async fn survey_buildings(
        &mut self,
        estimator: &FootprintEstimator,
        client: &dyn BuildingDataClient,
        exclusion: Option<Polygon>,
    ) -> WorkflowResult<SurveyOutcome> {
        let request = self.begin_building_survey(exclusion)?;
        let estimate = estimator
            .estimate_with_client(&request.property, request.exclusion.as_ref(), client)
            .await;
        Ok(self.complete_building_survey(request.ticket, estimate))
    }
}
