//! Advertising session controller
//!
//! [`AdvertisingSession`] owns one advertiser and the [`SessionState`] that
//! describes it. Every call suspends until the Bluetooth stack reports, so
//! there is never more than one request outstanding per session.
//! [`BeaconController`] shares a session between tasks; callers queue behind
//! an async mutex and each receives the outcome of its own request.

use std::sync::Arc;
use std::time::Duration;

use ibeacon_core::{
    encode, encode_raw, AdvertisementRecord, AdvertisingTuning, BeaconError, BeaconIdentity,
    Result as BeaconResult, SessionEvent, SessionHandle, SessionState,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::advertising::BeaconAdvertiser;
use crate::config::AdvertiserConfig;
use crate::error::BleError;
use crate::protocol::AdvertiseSettings;

/// Resolution of a successful [`BeaconController::start_beacon`]
pub const STARTED_MESSAGE: &str = "iBeacon advertising started";

/// Resolution of a successful [`BeaconController::stop_beacon`]
pub const STOPPED_MESSAGE: &str = "Advertising stopped";

// ----------------------------------------------------------------------------
// Advertising Session
// ----------------------------------------------------------------------------

pub struct AdvertisingSession<A: BeaconAdvertiser> {
    advertiser: A,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    next_handle: u64,
    settings: AdvertiseSettings,
    start_timeout: Duration,
    /// A timed-out or abandoned request may still have the radio on air
    unsettled: bool,
}

impl<A: BeaconAdvertiser> AdvertisingSession<A> {
    pub fn new(advertiser: A, config: &AdvertiserConfig) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            advertiser,
            state: SessionState::Idle,
            state_tx,
            next_handle: 0,
            settings: config.settings(),
            start_timeout: config.start_timeout(),
            unsettled: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn advertiser(&self) -> &A {
        &self.advertiser
    }

    pub fn settings(&self) -> &AdvertiseSettings {
        &self.settings
    }

    /// Receive every state change from now on
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Broadcast `identity`, replacing whatever is on air
    pub async fn start(
        &mut self,
        identity: &BeaconIdentity,
        tuning: &AdvertisingTuning,
    ) -> BeaconResult<SessionHandle> {
        self.submit(encode(identity, tuning)).await
    }

    /// Validate caller input, then broadcast it
    ///
    /// Input that fails validation never reaches the radio. An idle or failed
    /// session records the rejection; a live broadcast is left untouched.
    pub async fn start_raw(
        &mut self,
        uuid: &str,
        major: i64,
        minor: i64,
        tx_power: i64,
    ) -> BeaconResult<SessionHandle> {
        let record = match encode_raw(uuid, major, minor, tx_power) {
            Ok(record) => record,
            Err(err) => {
                let reason = BeaconError::from(err);
                warn!("Rejected beacon parameters: {}", reason);
                if matches!(self.state, SessionState::Idle | SessionState::Failed { .. }) {
                    self.apply(SessionEvent::Rejected {
                        reason: reason.clone(),
                    })?;
                }
                return Err(reason);
            }
        };
        self.submit(record).await
    }

    /// Stop the broadcast identified by `handle`
    ///
    /// A handle from an earlier broadcast, or a session with nothing on air,
    /// resolves without touching the radio.
    pub async fn stop(&mut self, handle: SessionHandle) -> BeaconResult<()> {
        match self.state.handle() {
            Some(current) if current == handle => self.stop_current().await,
            Some(current) => {
                debug!("Ignoring stop for {}; {} is on air", handle, current);
                Ok(())
            }
            None => self.stop_current().await,
        }
    }

    /// Stop whatever is on air
    pub async fn stop_current(&mut self) -> BeaconResult<()> {
        self.settle().await?;

        if !self.state.is_advertising() {
            if matches!(self.state, SessionState::Failed { .. }) {
                self.apply(SessionEvent::Stop)?;
            }
            debug!("Stop requested with nothing on air");
            return Ok(());
        }

        self.apply(SessionEvent::Stop)?;
        match self.bounded_stop().await {
            Ok(()) => {
                self.apply(SessionEvent::StopAcknowledged)?;
                info!("Beacon advertising stopped");
                Ok(())
            }
            Err(reason) => {
                warn!("Stack refused to stop advertising: {}", reason);
                self.apply(SessionEvent::StopFailed {
                    reason: reason.clone(),
                })?;
                Err(reason)
            }
        }
    }

    async fn submit(&mut self, record: AdvertisementRecord) -> BeaconResult<SessionHandle> {
        self.settle().await?;

        if self.state.is_advertising() {
            debug!("Stopping current broadcast before resubmitting");
            self.stop_current().await?;
        }

        self.apply(SessionEvent::Start { record })?;
        debug!(
            "Submitting {} to {} ({})",
            record.identity(),
            self.advertiser.platform_name(),
            record
        );

        let limit = self.start_timeout;
        let outcome = match tokio::time::timeout(
            limit,
            self.advertiser.start_advertising(&record, &self.settings),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("No start confirmation within {:?}; withdrawing request", limit);
                self.unsettled = true;
                match self.bounded_stop().await {
                    Ok(()) => self.unsettled = false,
                    Err(err) => debug!("Withdrawal after timeout failed: {}", err),
                }
                Err(BleError::CallbackTimeout(limit).into())
            }
        };

        match outcome {
            Ok(()) => {
                self.next_handle += 1;
                let handle = SessionHandle::new(self.next_handle);
                self.apply(SessionEvent::StartSucceeded { handle })?;
                info!("Advertising {} as {}", record.identity(), handle);
                Ok(handle)
            }
            Err(reason) => {
                warn!("Beacon start failed [{}]: {}", reason.code(), reason);
                self.apply(SessionEvent::StartFailed {
                    reason: reason.clone(),
                })?;
                Err(reason)
            }
        }
    }

    async fn bounded_stop(&mut self) -> BeaconResult<()> {
        let limit = self.start_timeout;
        match tokio::time::timeout(limit, self.advertiser.stop_advertising()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BleError::CallbackTimeout(limit).into()),
        }
    }

    /// Withdraw anything a dropped caller or a timed-out start left behind
    ///
    /// Fails when the stack still does not confirm the stop; nothing new is
    /// submitted until it does.
    async fn settle(&mut self) -> BeaconResult<()> {
        if self.state.is_pending() {
            warn!(
                "Previous request abandoned in state {}; resetting session",
                self.state.state_name()
            );
            self.set_state(SessionState::Idle);
            self.unsettled = true;
        }
        if self.unsettled {
            debug!("Withdrawing leftover broadcast before the next request");
            self.bounded_stop().await?;
            self.unsettled = false;
        }
        Ok(())
    }

    fn apply(&mut self, event: SessionEvent) -> BeaconResult<()> {
        let next = self
            .state
            .clone()
            .transition(event)
            .map_err(BleError::from)?;
        debug!("Session {} -> {}", self.state.state_name(), next.state_name());
        self.set_state(next);
        Ok(())
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state.clone();
        self.state_tx.send_replace(state);
    }
}

// ----------------------------------------------------------------------------
// Shared Controller
// ----------------------------------------------------------------------------

/// Cloneable handle that serializes access to one [`AdvertisingSession`]
pub struct BeaconController<A: BeaconAdvertiser> {
    session: Arc<Mutex<AdvertisingSession<A>>>,
    state_rx: watch::Receiver<SessionState>,
}

impl<A: BeaconAdvertiser> Clone for BeaconController<A> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            state_rx: self.state_rx.clone(),
        }
    }
}

impl<A: BeaconAdvertiser> BeaconController<A> {
    pub fn new(session: AdvertisingSession<A>) -> Self {
        let state_rx = session.subscribe();
        Self {
            session: Arc::new(Mutex::new(session)),
            state_rx,
        }
    }

    /// Build a controller directly from an advertiser
    pub fn with_advertiser(advertiser: A, config: &AdvertiserConfig) -> Self {
        Self::new(AdvertisingSession::new(advertiser, config))
    }

    pub async fn start(
        &self,
        identity: &BeaconIdentity,
        tuning: &AdvertisingTuning,
    ) -> BeaconResult<SessionHandle> {
        self.session.lock().await.start(identity, tuning).await
    }

    pub async fn stop(&self, handle: SessionHandle) -> BeaconResult<()> {
        self.session.lock().await.stop(handle).await
    }

    /// Validate and broadcast raw caller input
    pub async fn start_beacon(
        &self,
        uuid: &str,
        major: i64,
        minor: i64,
        tx_power: i64,
    ) -> BeaconResult<String> {
        self.session
            .lock()
            .await
            .start_raw(uuid, major, minor, tx_power)
            .await?;
        Ok(STARTED_MESSAGE.to_string())
    }

    /// Stop whatever this controller has on air
    pub async fn stop_beacon(&self) -> BeaconResult<String> {
        self.session.lock().await.stop_current().await?;
        Ok(STOPPED_MESSAGE.to_string())
    }

    /// Latest published state
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    pub async fn platform_name(&self) -> &'static str {
        self.session.lock().await.advertiser().platform_name()
    }
}
