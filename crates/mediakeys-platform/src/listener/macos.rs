//! macOS listener: a listen-only CGEventTap on system-defined events.
//!
//! Media keys reach the window server as `NSSystemDefined` events (aux control
//! buttons). The tap observes them and lets them through untouched so other
//! applications still receive them. Requires the Input Monitoring permission;
//! without it tap creation fails and the listener stays inert.

use super::Backend;
use crate::{PlatformError, PlatformResult};
use core_foundation::base::TCFType;
use core_foundation::runloop::{
    kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop, CFRunLoopSource,
};
use core_graphics::event::{CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement};
use mediakeys_core::{keymap, EventQueue, ListenerConfig, RunFlag};
use objc2::encode::{Encoding, RefEncode};
use objc2::rc::{autoreleasepool, Retained};
use objc2::{msg_send, ClassType};
use objc2_app_kit::NSEvent;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, trace, warn};

// FFI declarations for functions not exposed by the core-graphics crate
type CFMachPortRef = *mut c_void;
type CFRunLoopSourceRef = *mut c_void;
type CFRunLoopRef = *mut c_void;
type CFAllocatorRef = *const c_void;
type CFIndex = isize;
type CGEventRef = *mut c_void;

/// `NX_SYSDEFINED`, not part of core-graphics' `CGEventType`.
const SYSTEM_DEFINED_EVENT: u32 = 14;
const TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: CGEventTapCallback,
        user_info: *mut c_void,
    ) -> CFMachPortRef;

    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortCreateRunLoopSource(
        allocator: CFAllocatorRef,
        port: CFMachPortRef,
        order: CFIndex,
    ) -> CFRunLoopSourceRef;

    fn CFMachPortInvalidate(port: CFMachPortRef);
    fn CFRelease(cf: *const c_void);
    fn CFRunLoopStop(run_loop: CFRunLoopRef);
}

// The event type is taken as u32: NX_SYSDEFINED has no CGEventType variant.
type CGEventTapCallback = extern "C" fn(
    proxy: *mut c_void,
    event_type: u32,
    cg_event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef;

/// Opaque `struct __CGEvent`, so `eventWithCGEvent:` sees the right encoding.
#[repr(C)]
struct OpaqueCGEvent {
    _private: [u8; 0],
}

unsafe impl RefEncode for OpaqueCGEvent {
    const ENCODING_REF: Encoding = Encoding::Pointer(&Encoding::Struct("__CGEvent", &[]));
}

/// Raw run loop pointer of the listener thread.
struct RunLoopHandle(CFRunLoopRef);

// Only used for CFRunLoopStop, which is thread-safe.
unsafe impl Send for RunLoopHandle {}

pub struct EventTapBackend {
    config: ListenerConfig,
    /// Set while the listener thread's run loop is alive.
    run_loop: Mutex<Option<RunLoopHandle>>,
}

impl EventTapBackend {
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            config,
            run_loop: Mutex::new(None),
        }
    }

    fn publish_run_loop(&self, handle: Option<RunLoopHandle>) {
        *self.run_loop.lock().unwrap_or_else(|e| e.into_inner()) = handle;
    }
}

impl Backend for EventTapBackend {
    const NAME: &'static str = "eventtap";

    fn run(&self, queue: &EventQueue, flag: &RunFlag) -> PlatformResult<()> {
        // Declared first so it outlives the tap that points at it.
        let context = Box::new(TapContext {
            queue: queue.clone(),
            tap: AtomicPtr::new(ptr::null_mut()),
        });

        let tap = EventTap::create(&context)?;
        context.tap.store(tap.port, Ordering::SeqCst);
        debug!("Event tap created");

        let source = unsafe { CFMachPortCreateRunLoopSource(ptr::null(), tap.port, 0) };
        if source.is_null() {
            return Err(PlatformError::Native(
                "failed to create run loop source".into(),
            ));
        }
        let source = unsafe { CFRunLoopSource::wrap_under_create_rule(source as *mut _) };

        let run_loop = CFRunLoop::get_current();
        let _attached = AttachedSource::new(&run_loop, &source);
        self.publish_run_loop(Some(RunLoopHandle(
            run_loop.as_concrete_TypeRef() as CFRunLoopRef,
        )));

        unsafe { CGEventTapEnable(tap.port, true) };
        if flag.mark_running() {
            info!("Listening for media key events");
        }

        // Bounded slices so a stop that races the first slice is still seen.
        let slice = self.config.dispatch_timeout();
        while flag.is_running() {
            CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, slice, false);
        }

        self.publish_run_loop(None);
        Ok(())
    }

    fn wake(&self) {
        let guard = self.run_loop.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = guard.as_ref() {
            unsafe { CFRunLoopStop(handle.0) };
        }
    }
}

/// State reachable from the tap callback via `user_info`.
struct TapContext {
    queue: EventQueue,
    tap: AtomicPtr<c_void>,
}

/// Installed event tap; disabled, invalidated and released on drop.
struct EventTap {
    port: CFMachPortRef,
}

impl EventTap {
    fn create(context: &TapContext) -> PlatformResult<Self> {
        let event_mask: u64 = 1 << SYSTEM_DEFINED_EVENT;
        let port = unsafe {
            CGEventTapCreate(
                CGEventTapLocation::Session as u32,
                CGEventTapPlacement::HeadInsertEventTap as u32,
                CGEventTapOptions::ListenOnly as u32,
                event_mask,
                event_tap_callback,
                context as *const TapContext as *mut c_void,
            )
        };

        if port.is_null() {
            return Err(PlatformError::Native(
                "failed to create event tap - input monitoring permission may not be granted"
                    .into(),
            ));
        }
        Ok(Self { port })
    }
}

impl Drop for EventTap {
    fn drop(&mut self) {
        unsafe {
            CGEventTapEnable(self.port, false);
            CFMachPortInvalidate(self.port);
            CFRelease(self.port as *const c_void);
        }
    }
}

/// Run loop source attached in common modes; removed on drop.
struct AttachedSource<'a> {
    run_loop: &'a CFRunLoop,
    source: &'a CFRunLoopSource,
}

impl<'a> AttachedSource<'a> {
    fn new(run_loop: &'a CFRunLoop, source: &'a CFRunLoopSource) -> Self {
        run_loop.add_source(source, unsafe { kCFRunLoopCommonModes });
        Self { run_loop, source }
    }
}

impl Drop for AttachedSource<'_> {
    fn drop(&mut self) {
        self.run_loop
            .remove_source(self.source, unsafe { kCFRunLoopCommonModes });
    }
}

/// Runs on the listener thread's run loop.
extern "C" fn event_tap_callback(
    _proxy: *mut c_void,
    event_type: u32,
    cg_event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    if user_info.is_null() {
        return cg_event;
    }
    let context = unsafe { &*(user_info as *const TapContext) };

    match event_type {
        TAP_DISABLED_BY_TIMEOUT | TAP_DISABLED_BY_USER_INPUT => {
            warn!(event_type, "Event tap disabled by the system, re-enabling");
            let tap = context.tap.load(Ordering::SeqCst);
            if !tap.is_null() {
                unsafe { CGEventTapEnable(tap, true) };
            }
        }
        SYSTEM_DEFINED_EVENT => {
            if let Some((subtype, data1)) = system_defined_fields(cg_event) {
                trace!(subtype, data1, "System-defined event");
                if let Some(key) = keymap::from_system_defined(subtype, data1) {
                    context.queue.push(key);
                    debug!(?key, "Queued media key (event tap)");
                }
            }
        }
        _ => {}
    }

    // Listen-only: the event continues to other applications unchanged.
    cg_event
}

/// Read `subtype` and `data1` through NSEvent; CGEvent has no public field for them.
fn system_defined_fields(cg_event: CGEventRef) -> Option<(i16, i64)> {
    if cg_event.is_null() {
        return None;
    }
    autoreleasepool(|_| unsafe {
        let event = cg_event as *mut OpaqueCGEvent;
        let ns_event: Option<Retained<NSEvent>> =
            msg_send![NSEvent::class(), eventWithCGEvent: event];
        let ns_event = ns_event?;
        let subtype: i16 = msg_send![&*ns_event, subtype];
        let data1: isize = msg_send![&*ns_event, data1];
        Some((subtype, data1 as i64))
    })
}
