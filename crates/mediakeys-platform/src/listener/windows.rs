//! Windows listener: a message-only window receiving `WM_APPCOMMAND`.
//!
//! Media keys arrive as application commands. The window is never visible and
//! only gets messages posted or sent to it directly.

use super::Backend;
use crate::{PlatformError, PlatformResult};
use mediakeys_core::{keymap, EventQueue, ListenerConfig, RunFlag};
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use tracing::{debug, info, trace, warn};
use windows_sys::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    GetWindowLongPtrW, PostMessageW, RegisterClassW, SetWindowLongPtrW, TranslateMessage,
    UnregisterClassW, CREATESTRUCTW, GWLP_USERDATA, MSG, WM_APPCOMMAND, WM_NCCREATE, WM_QUIT,
    WNDCLASSW,
};

const WINDOW_CLASS: &str = "MediaKeysMessageWindow";
const WINDOW_TITLE: &str = "Media Keys";

// HWND_MESSAGE parent makes the window message-only.
const HWND_MESSAGE: HWND = -3isize as HWND;

pub struct AppCommandBackend {
    /// Published once the window exists so `wake` can post WM_QUIT to it.
    window: AtomicPtr<c_void>,
}

impl AppCommandBackend {
    pub fn new(_config: ListenerConfig) -> Self {
        Self {
            window: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

impl Backend for AppCommandBackend {
    const NAME: &'static str = "appcommand";

    fn run(&self, queue: &EventQueue, flag: &RunFlag) -> PlatformResult<()> {
        let instance = unsafe { GetModuleHandleW(ptr::null()) };

        // Drop order (reverse of declaration) releases window, then class,
        // then the context the window procedure points at.
        let context = Box::new(WindowContext {
            queue: queue.clone(),
        });
        let class = WindowClass::register(WINDOW_CLASS, instance)?;
        let window = MessageWindow::create(&class, &context)?;
        debug!(hwnd = ?window.hwnd, "Message window created");

        // Publish before checking the flag: a concurrent stop either sees the
        // handle and posts WM_QUIT, or we see the stop request here.
        self.window.store(window.hwnd, Ordering::SeqCst);
        if flag.mark_running() {
            info!("Listening for media key events");
        }

        let mut msg: MSG = unsafe { std::mem::zeroed() };
        while flag.is_running() {
            let ret = unsafe { GetMessageW(&mut msg, ptr::null_mut(), 0, 0) };
            if ret == 0 {
                break;
            }
            if ret == -1 {
                warn!("GetMessageW failed");
                break;
            }
            unsafe {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        self.window.store(ptr::null_mut(), Ordering::SeqCst);
        drop(window);
        drop(class);
        Ok(())
    }

    fn wake(&self) {
        let hwnd = self.window.load(Ordering::SeqCst);
        if !hwnd.is_null() {
            unsafe { PostMessageW(hwnd, WM_QUIT, 0, 0) };
        }
    }
}

/// State reachable from the window procedure via `GWLP_USERDATA`.
struct WindowContext {
    queue: EventQueue,
}

/// Registered window class; unregistered on drop.
struct WindowClass {
    name: Vec<u16>,
    instance: HINSTANCE,
}

impl WindowClass {
    fn register(name: &str, instance: HINSTANCE) -> PlatformResult<Self> {
        let name = wide(name);
        let wc = WNDCLASSW {
            style: 0,
            lpfnWndProc: Some(window_proc),
            cbClsExtra: 0,
            cbWndExtra: 0,
            hInstance: instance,
            hIcon: ptr::null_mut(),
            hCursor: ptr::null_mut(),
            hbrBackground: ptr::null_mut(),
            lpszMenuName: ptr::null(),
            lpszClassName: name.as_ptr(),
        };

        if unsafe { RegisterClassW(&wc) } == 0 {
            return Err(PlatformError::Native(format!(
                "failed to register window class: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(Self { name, instance })
    }
}

impl Drop for WindowClass {
    fn drop(&mut self) {
        unsafe { UnregisterClassW(self.name.as_ptr(), self.instance) };
    }
}

/// Message-only window; destroyed on drop.
struct MessageWindow {
    hwnd: HWND,
}

impl MessageWindow {
    fn create(class: &WindowClass, context: &WindowContext) -> PlatformResult<Self> {
        let title = wide(WINDOW_TITLE);
        let hwnd = unsafe {
            CreateWindowExW(
                0,
                class.name.as_ptr(),
                title.as_ptr(),
                0,
                0,
                0,
                0,
                0,
                HWND_MESSAGE,
                ptr::null_mut(),
                class.instance,
                context as *const WindowContext as *const c_void,
            )
        };

        if hwnd.is_null() {
            return Err(PlatformError::Native(format!(
                "failed to create message window: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(Self { hwnd })
    }
}

impl Drop for MessageWindow {
    fn drop(&mut self) {
        unsafe { DestroyWindow(self.hwnd) };
    }
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_NCCREATE => {
            let create = &*(lparam as *const CREATESTRUCTW);
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, create.lpCreateParams as isize);
            DefWindowProcW(hwnd, msg, wparam, lparam)
        }
        WM_APPCOMMAND => {
            let context = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const WindowContext;
            if let Some(context) = context.as_ref() {
                let cmd = keymap::app_command_from_lparam(lparam);
                trace!(cmd, "WM_APPCOMMAND");
                if let Some(key) = keymap::from_app_command(cmd) {
                    context.queue.push(key);
                    debug!(?key, "Queued media key (WM_APPCOMMAND)");
                    // Handled: suppress the default system behavior.
                    return 1;
                }
            }
            DefWindowProcW(hwnd, msg, wparam, lparam)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
