//! macOS BLE advertising implementation using Core Bluetooth
//!
//! `CBPeripheralManager` reports state changes and advertising outcomes
//! through its delegate on a private dispatch queue. The delegate class
//! registered here forwards both into [`PendingSlot`]s owned by the
//! advertiser.
//!
//! Core Bluetooth answers every `startAdvertising:` exactly once and in
//! order, so the n-th `peripheralManagerDidStartAdvertising:error:` belongs
//! to the n-th armed start. An answer for a start that was already given up
//! on is dropped rather than delivered to the next one.

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::sync::atomic::{AtomicIsize, AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use cocoa::base::{id, nil};
use ibeacon_core::{AdvertisementRecord, BeaconError, Result as BeaconResult};
use objc::declare::ClassDecl;
use objc::runtime::{Class, Object, Sel};
use objc::{class, msg_send, sel, sel_impl};
use objc_foundation::{INSData, INSString, NSData, NSString};
use tracing::{debug, info, warn};

use crate::error::BleError;
use crate::pending::{wait_for, PendingRequest, PendingSlot, PendingToken};
use crate::protocol::{manufacturer_payload_with_company_id, AdvertiseSettings};

use super::BeaconAdvertiser;

const DELEGATE_CLASS_NAME: &str = "IBeaconPeripheralManagerDelegate";
const CONTEXT_IVAR: &str = "_ibeaconContext";
const MANUFACTURER_DATA_KEY: &str = "kCBAdvDataManufacturerData";

/// How long to wait for the manager to leave the unknown state
const STATE_WAIT: Duration = Duration::from_secs(5);

// CBManagerState
const STATE_UNKNOWN: isize = 0;
const STATE_RESETTING: isize = 1;
const STATE_UNSUPPORTED: isize = 2;
const STATE_UNAUTHORIZED: isize = 3;
const STATE_POWERED_OFF: isize = 4;
const STATE_POWERED_ON: isize = 5;

#[link(name = "CoreBluetooth", kind = "framework")]
extern "C" {}

extern "C" {
    fn dispatch_queue_create(label: *const c_char, attr: *const c_void) -> id;
}

// ----------------------------------------------------------------------------
// Delegate
// ----------------------------------------------------------------------------

struct DelegateContext {
    state: AtomicIsize,
    state_changed: PendingSlot<isize>,
    start: PendingSlot<BeaconResult<()>>,
    /// Start callbacks received so far
    start_answers: AtomicU64,
}

fn delegate_class() -> Option<&'static Class> {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        let Some(mut decl) = ClassDecl::new(DELEGATE_CLASS_NAME, class!(NSObject)) else {
            return;
        };
        decl.add_ivar::<usize>(CONTEXT_IVAR);
        unsafe {
            decl.add_method(
                sel!(peripheralManagerDidUpdateState:),
                did_update_state as extern "C" fn(&Object, Sel, id),
            );
            decl.add_method(
                sel!(peripheralManagerDidStartAdvertising:error:),
                did_start_advertising as extern "C" fn(&Object, Sel, id, id),
            );
        }
        decl.register();
    });
    Class::get(DELEGATE_CLASS_NAME)
}

fn context(this: &Object) -> Option<&DelegateContext> {
    unsafe {
        let ptr: usize = *this.get_ivar(CONTEXT_IVAR);
        if ptr == 0 {
            None
        } else {
            Some(&*(ptr as *const DelegateContext))
        }
    }
}

extern "C" fn did_update_state(this: &Object, _sel: Sel, manager: id) {
    let Some(ctx) = context(this) else {
        return;
    };
    let state: isize = unsafe { msg_send![manager, state] };
    ctx.state.store(state, Ordering::SeqCst);
    debug!("CBPeripheralManager state changed to {}", state);

    ctx.state_changed.notify(state);
    if let Some(err) = state_error(state) {
        // Outstanding starts die with the radio and are never answered
        if let Some(latest) = ctx.start.latest() {
            ctx.start_answers.store(latest.sequence(), Ordering::SeqCst);
        }
        ctx.start.notify(Err(err.into()));
    }
}

extern "C" fn did_start_advertising(this: &Object, _sel: Sel, _manager: id, error: id) {
    let Some(ctx) = context(this) else {
        return;
    };
    let outcome: BeaconResult<()> = if error == nil {
        Ok(())
    } else {
        Err(unsafe { ns_error_to_ble_error(error) }.into())
    };
    let answer = ctx.start_answers.fetch_add(1, Ordering::SeqCst) + 1;
    if !ctx.start.resolve(PendingToken::from_sequence(answer), outcome) {
        debug!("Advertising callback {} arrived with no pending start", answer);
    }
}

unsafe fn ns_error_to_ble_error(error: id) -> BleError {
    let code: isize = msg_send![error, code];
    let description: id = msg_send![error, localizedDescription];
    let utf8: *const c_char = if description == nil {
        std::ptr::null()
    } else {
        msg_send![description, UTF8String]
    };
    let message = if utf8.is_null() {
        "unknown CoreBluetooth error".to_string()
    } else {
        CStr::from_ptr(utf8).to_string_lossy().into_owned()
    };
    BleError::Platform {
        code: i32::try_from(code).unwrap_or(i32::MAX),
        message,
    }
}

fn state_error(state: isize) -> Option<BleError> {
    match state {
        STATE_POWERED_OFF => Some(BleError::AdapterPoweredOff),
        STATE_UNSUPPORTED => Some(BleError::PeripheralUnsupported(
            "CBPeripheralManager reports an unsupported state".to_string(),
        )),
        STATE_UNAUTHORIZED => Some(BleError::NotAuthorized(
            "Bluetooth access denied".to_string(),
        )),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// macOS Implementation
// ----------------------------------------------------------------------------

pub struct MacOSAdvertiser {
    peripheral_manager: Option<id>,
    delegate: Option<id>,
    context: Arc<DelegateContext>,
    is_advertising: bool,
}

unsafe impl Send for MacOSAdvertiser {}

unsafe impl Sync for MacOSAdvertiser {}

impl MacOSAdvertiser {
    pub fn new() -> Self {
        Self {
            peripheral_manager: None,
            delegate: None,
            context: Arc::new(DelegateContext {
                state: AtomicIsize::new(STATE_UNKNOWN),
                state_changed: PendingSlot::new(),
                start: PendingSlot::new(),
                start_answers: AtomicU64::new(0),
            }),
            is_advertising: false,
        }
    }

    fn initialize_peripheral_manager(&mut self) -> BeaconResult<()> {
        if self.peripheral_manager.is_some() {
            return Ok(());
        }

        unsafe {
            let delegate_class = delegate_class().ok_or_else(|| {
                BeaconError::unsupported("Failed to register CBPeripheralManager delegate class")
            })?;
            let delegate: id = msg_send![delegate_class, new];
            (*delegate).set_ivar::<usize>(CONTEXT_IVAR, Arc::as_ptr(&self.context) as usize);

            let cb_peripheral_manager_class = Class::get("CBPeripheralManager").ok_or_else(|| {
                BeaconError::unsupported(
                    "CBPeripheralManager class not available - Core Bluetooth framework missing",
                )
            })?;

            let queue = dispatch_queue_create(c"ibeacon.corebluetooth".as_ptr(), std::ptr::null());
            let peripheral_manager: id = msg_send![cb_peripheral_manager_class, alloc];
            let peripheral_manager: id = msg_send![peripheral_manager,
                initWithDelegate: delegate
                queue: queue
                options: nil
            ];

            if peripheral_manager == nil {
                let _: () = msg_send![delegate, release];
                return Err(BeaconError::unsupported(
                    "Failed to create CBPeripheralManager instance",
                ));
            }

            self.delegate = Some(delegate);
            self.peripheral_manager = Some(peripheral_manager);
        }

        info!("macOS CBPeripheralManager initialized");
        Ok(())
    }

    /// Wait for the first state report, then map it onto the taxonomy
    async fn wait_until_powered_on(&self) -> BeaconResult<()> {
        let mut state = self.context.state.load(Ordering::SeqCst);
        if state == STATE_UNKNOWN || state == STATE_RESETTING {
            let request = self.context.state_changed.arm()?;
            // The callback may have landed between the load and the arm
            state = self.context.state.load(Ordering::SeqCst);
            if state == STATE_UNKNOWN || state == STATE_RESETTING {
                state = wait_for(&self.context.state_changed, request, Some(STATE_WAIT)).await?;
            } else {
                self.context.state_changed.cancel(request.token());
            }
        }

        match state_error(state) {
            Some(err) => Err(err.into()),
            None if state == STATE_POWERED_ON => Ok(()),
            None => Err(BeaconError::radio_unavailable(format!(
                "Bluetooth not ready (state {})",
                state
            ))),
        }
    }

    /// Hand the advertisement dictionary to Core Bluetooth
    fn submit(&mut self, record: &AdvertisementRecord) -> BeaconResult<PendingRequest<BeaconResult<()>>> {
        let peripheral_manager = self
            .peripheral_manager
            .ok_or_else(|| BeaconError::radio_unavailable("Peripheral manager not initialized"))?;

        if self.is_advertising {
            unsafe {
                let _: () = msg_send![peripheral_manager, stopAdvertising];
            }
            self.is_advertising = false;
        }

        let request = self.context.start.arm()?;
        let payload = manufacturer_payload_with_company_id(record);

        unsafe {
            let data = NSData::with_bytes(&payload);
            let key = NSString::from_str(MANUFACTURER_DATA_KEY);
            let advertising_data: id = msg_send![class!(NSDictionary),
                dictionaryWithObject: &*data
                forKey: &*key
            ];
            let _: () = msg_send![peripheral_manager, startAdvertising: advertising_data];
        }

        Ok(request)
    }
}

impl Default for MacOSAdvertiser {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MacOSAdvertiser {
    fn drop(&mut self) {
        unsafe {
            if let Some(peripheral_manager) = self.peripheral_manager.take() {
                let _: () = msg_send![peripheral_manager, stopAdvertising];
                let _: () = msg_send![peripheral_manager, setDelegate: nil];
                let _: () = msg_send![peripheral_manager, release];
            }
            if let Some(delegate) = self.delegate.take() {
                (*delegate).set_ivar::<usize>(CONTEXT_IVAR, 0);
                let _: () = msg_send![delegate, release];
            }
        }
    }
}

#[async_trait::async_trait]
impl BeaconAdvertiser for MacOSAdvertiser {
    async fn start_advertising(
        &mut self,
        record: &AdvertisementRecord,
        settings: &AdvertiseSettings,
    ) -> BeaconResult<()> {
        self.initialize_peripheral_manager()?;
        self.wait_until_powered_on().await?;

        debug!(
            "Core Bluetooth chooses interval and power itself; ignoring {:?}",
            settings
        );
        let request = self.submit(record)?;
        wait_for(&self.context.start, request, None).await??;

        self.is_advertising = true;
        info!("Started macOS BLE advertising of {}", record.identity());
        Ok(())
    }

    async fn stop_advertising(&mut self) -> BeaconResult<()> {
        self.context.start.clear();
        if let Some(peripheral_manager) = self.peripheral_manager {
            unsafe {
                let _: () = msg_send![peripheral_manager, stopAdvertising];
            }
            if self.is_advertising {
                info!("Stopped macOS BLE advertising");
            } else {
                warn!("Stop requested while macOS advertiser was not advertising");
            }
            self.is_advertising = false;
        }
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        self.is_advertising
    }

    fn platform_name(&self) -> &'static str {
        "macos-corebluetooth"
    }
}
