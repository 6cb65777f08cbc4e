//! macOS backend.
//!
//! Displays come from CoreGraphics, window control from the Accessibility
//! API and running applications from `NSWorkspace`.
//!
//! Requirements:
//! - Accessibility permission must be granted to the executable
//! - System Settings > Privacy & Security > Accessibility

use std::ffi::{c_char, c_void, CStr};
use std::ptr;

use core_foundation::array::{CFArrayGetCount, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation::base::{CFType, CFTypeRef, TCFType};
use core_foundation::string::{CFString, CFStringRef};
use core_graphics::display::CGDisplay;
use core_graphics::geometry::{CGPoint, CGSize};
use quadpos_core_layout::{DisplayDetails, Point, RawDisplay, Rect, Size};

use crate::apps::{visible_apps, AppEntry};
use crate::{
    Backend, DisplayDetailsSource, DisplaySource, Pid, PlatformError, ProcessSource,
    RunningApp, WindowControl,
};

type AXError = i32;

const AX_SUCCESS: AXError = 0;
const AX_VALUE_CG_POINT_TYPE: u32 = 1;
const AX_VALUE_CG_SIZE_TYPE: u32 = 2;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXUIElementCreateApplication(pid: i32) -> CFTypeRef;
    fn AXUIElementCopyAttributeValue(
        element: CFTypeRef,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> AXError;
    fn AXUIElementSetAttributeValue(
        element: CFTypeRef,
        attribute: CFStringRef,
        value: CFTypeRef,
    ) -> AXError;
    fn AXUIElementPerformAction(element: CFTypeRef, action: CFStringRef) -> AXError;
    fn AXValueCreate(value_type: u32, value: *const c_void) -> CFTypeRef;
    fn AXValueGetValue(value: CFTypeRef, value_type: u32, out: *mut c_void) -> bool;
}

/// Backend for macOS desktops.
#[derive(Debug, Default)]
pub struct MacosPlatform;

impl MacosPlatform {
    pub fn new() -> Self {
        Self
    }

    /// Active displays with their CoreGraphics bounds.
    ///
    /// CoreGraphics reports bounds with a top-left origin at the main
    /// display; they are flipped here into arrangement space (bottom-left
    /// origin at the main display).
    fn active(&self) -> Result<Vec<(usize, CGDisplay, Rect)>, PlatformError> {
        let ids = CGDisplay::active_displays()
            .map_err(|e| PlatformError::Enumeration(format!("CGGetActiveDisplayList: {}", e)))?;
        let main_height = CGDisplay::main().bounds().size.height;

        Ok(ids
            .into_iter()
            .enumerate()
            .map(|(index, id)| {
                let display = CGDisplay::new(id);
                let bounds = display.bounds();
                let arrangement_y = main_height - (bounds.origin.y + bounds.size.height);
                let rect = Rect::new(
                    bounds.origin.x.round() as i32,
                    arrangement_y.round() as i32,
                    bounds.size.width.round() as i32,
                    bounds.size.height.round() as i32,
                );
                (index, display, rect)
            })
            .collect())
    }
}

impl DisplaySource for MacosPlatform {
    fn displays(&self) -> Result<Vec<RawDisplay>, PlatformError> {
        Ok(self
            .active()?
            .into_iter()
            .map(|(index, display, rect)| RawDisplay {
                index,
                stable_id: Some(display.id.to_string()),
                width: rect.width,
                height: rect.height,
                x: rect.x,
                y: rect.y,
                is_primary: display.is_main(),
            })
            .collect())
    }
}

impl DisplayDetailsSource for MacosPlatform {
    fn display_details(&self) -> Result<Vec<DisplayDetails>, PlatformError> {
        Ok(self
            .active()?
            .into_iter()
            .map(|(index, display, rect)| {
                let os_name = if display.is_builtin() {
                    "Built-in Display".to_string()
                } else {
                    format!(
                        "External Display {:04x}:{:04x}",
                        display.vendor_number(),
                        display.model_number()
                    )
                };
                DisplayDetails {
                    index,
                    stable_id: Some(display.id.to_string()),
                    os_name,
                    width: rect.width,
                    height: rect.height,
                    x: rect.x,
                    y: rect.y,
                    is_primary: display.is_main(),
                    work_area: None,
                }
            })
            .collect())
    }
}

impl ProcessSource for MacosPlatform {
    fn running_apps(&self) -> Result<Vec<RunningApp>, PlatformError> {
        Ok(visible_apps(workspace::running_applications()?))
    }
}

/// `NSWorkspace.runningApplications` through the Objective-C runtime.
mod workspace {
    use super::*;

    type Id = *mut c_void;
    type Sel = *mut c_void;

    /// `NSApplicationActivationPolicyRegular`.
    const ACTIVATION_POLICY_REGULAR: isize = 0;

    #[link(name = "AppKit", kind = "framework")]
    extern "C" {}

    #[link(name = "objc")]
    extern "C" {
        fn objc_getClass(name: *const c_char) -> Id;
        fn sel_registerName(name: *const c_char) -> Sel;
        fn objc_msgSend();
        fn objc_autoreleasePoolPush() -> *mut c_void;
        fn objc_autoreleasePoolPop(pool: *mut c_void);
    }

    unsafe fn sel(name: &'static [u8]) -> Sel {
        sel_registerName(name.as_ptr() as *const c_char)
    }

    unsafe fn send_id(receiver: Id, selector: Sel) -> Id {
        let f: extern "C" fn(Id, Sel) -> Id = std::mem::transmute(objc_msgSend as *const ());
        f(receiver, selector)
    }

    unsafe fn send_index(receiver: Id, selector: Sel, index: usize) -> Id {
        let f: extern "C" fn(Id, Sel, usize) -> Id =
            std::mem::transmute(objc_msgSend as *const ());
        f(receiver, selector, index)
    }

    unsafe fn send_isize(receiver: Id, selector: Sel) -> isize {
        let f: extern "C" fn(Id, Sel) -> isize = std::mem::transmute(objc_msgSend as *const ());
        f(receiver, selector)
    }

    unsafe fn send_i32(receiver: Id, selector: Sel) -> i32 {
        let f: extern "C" fn(Id, Sel) -> i32 = std::mem::transmute(objc_msgSend as *const ());
        f(receiver, selector)
    }

    unsafe fn send_bool(receiver: Id, selector: Sel) -> bool {
        let f: extern "C" fn(Id, Sel) -> i8 = std::mem::transmute(objc_msgSend as *const ());
        f(receiver, selector) != 0
    }

    unsafe fn string(ns_string: Id) -> Option<String> {
        if ns_string.is_null() {
            return None;
        }
        let f: extern "C" fn(Id, Sel) -> *const c_char =
            std::mem::transmute(objc_msgSend as *const ());
        let utf8 = f(ns_string, sel(b"UTF8String\0"));
        if utf8.is_null() {
            return None;
        }
        Some(CStr::from_ptr(utf8).to_string_lossy().into_owned())
    }

    pub(super) fn running_applications() -> Result<Vec<AppEntry>, PlatformError> {
        unsafe {
            let class = objc_getClass(b"NSWorkspace\0".as_ptr() as *const c_char);
            if class.is_null() {
                return Err(PlatformError::Enumeration(
                    "NSWorkspace class unavailable".to_string(),
                ));
            }

            let pool = objc_autoreleasePoolPush();
            let shared = send_id(class, sel(b"sharedWorkspace\0"));
            let array = if shared.is_null() {
                ptr::null_mut()
            } else {
                send_id(shared, sel(b"runningApplications\0"))
            };
            if array.is_null() {
                objc_autoreleasePoolPop(pool);
                return Err(PlatformError::Enumeration(
                    "NSWorkspace returned no application list".to_string(),
                ));
            }

            let count = send_isize(array, sel(b"count\0")).max(0) as usize;
            let mut entries = Vec::with_capacity(count);
            for i in 0..count {
                let app = send_index(array, sel(b"objectAtIndex:\0"), i);
                if app.is_null() {
                    continue;
                }
                let pid = send_i32(app, sel(b"processIdentifier\0"));
                if pid <= 0 {
                    continue;
                }
                entries.push(AppEntry {
                    name: string(send_id(app, sel(b"localizedName\0"))),
                    bundle_id: string(send_id(app, sel(b"bundleIdentifier\0"))),
                    pid: pid as Pid,
                    regular: send_isize(app, sel(b"activationPolicy\0"))
                        == ACTIVATION_POLICY_REGULAR,
                    hidden: send_bool(app, sel(b"isHidden\0")),
                });
            }
            objc_autoreleasePoolPop(pool);
            Ok(entries)
        }
    }
}

/// Copy an attribute of an AX element, owning the result.
fn copy_attribute(element: &CFType, name: &'static str) -> Result<CFType, AXError> {
    let attribute = CFString::from_static_string(name);
    let mut value: CFTypeRef = ptr::null();
    let err = unsafe {
        AXUIElementCopyAttributeValue(
            element.as_CFTypeRef(),
            attribute.as_concrete_TypeRef(),
            &mut value,
        )
    };
    if err != AX_SUCCESS || value.is_null() {
        return Err(err);
    }
    Ok(unsafe { CFType::wrap_under_create_rule(value) })
}

/// The first window of a process.
fn first_window(pid: Pid) -> Result<CFType, PlatformError> {
    if !unsafe { AXIsProcessTrusted() } {
        return Err(PlatformError::PermissionDenied);
    }
    let app_ref = unsafe { AXUIElementCreateApplication(pid as i32) };
    if app_ref.is_null() {
        return Err(PlatformError::NoWindows { pid });
    }
    let app = unsafe { CFType::wrap_under_create_rule(app_ref) };

    let windows = copy_attribute(&app, "AXWindows").map_err(|code| {
        tracing::debug!("AXWindows for PID {} failed with code {}", pid, code);
        PlatformError::NoWindows { pid }
    })?;
    let array = windows.as_CFTypeRef() as CFArrayRef;
    if unsafe { CFArrayGetCount(array) } == 0 {
        return Err(PlatformError::NoWindows { pid });
    }
    let first = unsafe { CFArrayGetValueAtIndex(array, 0) };
    Ok(unsafe { CFType::wrap_under_get_rule(first as CFTypeRef) })
}

fn read_point(window: &CFType) -> Result<Point, PlatformError> {
    let value = copy_attribute(window, "AXPosition")
        .map_err(|code| PlatformError::Unavailable(format!("AXPosition (code {})", code)))?;
    let mut point = CGPoint::new(0.0, 0.0);
    let ok = unsafe {
        AXValueGetValue(
            value.as_CFTypeRef(),
            AX_VALUE_CG_POINT_TYPE,
            &mut point as *mut CGPoint as *mut c_void,
        )
    };
    if !ok {
        return Err(PlatformError::Unavailable("AXPosition value".to_string()));
    }
    Ok(Point::new(point.x as i32, point.y as i32))
}

fn read_size(window: &CFType) -> Result<Size, PlatformError> {
    let value = copy_attribute(window, "AXSize")
        .map_err(|code| PlatformError::Unavailable(format!("AXSize (code {})", code)))?;
    let mut size = CGSize::new(0.0, 0.0);
    let ok = unsafe {
        AXValueGetValue(
            value.as_CFTypeRef(),
            AX_VALUE_CG_SIZE_TYPE,
            &mut size as *mut CGSize as *mut c_void,
        )
    };
    if !ok {
        return Err(PlatformError::Unavailable("AXSize value".to_string()));
    }
    Ok(Size::new(size.width as i32, size.height as i32))
}

impl WindowControl for MacosPlatform {
    fn is_trusted(&self) -> bool {
        unsafe { AXIsProcessTrusted() }
    }

    fn window_frame(&self, pid: Pid) -> Result<Rect, PlatformError> {
        let window = first_window(pid)?;
        let origin = read_point(&window)?;
        let size = read_size(&window)?;
        Ok(Rect::from_origin_size(origin, size))
    }

    fn window_size(&self, pid: Pid) -> Result<Size, PlatformError> {
        read_size(&first_window(pid)?)
    }

    fn raise(&self, pid: Pid) -> Result<(), PlatformError> {
        let window = first_window(pid)?;
        let action = CFString::from_static_string("AXRaise");
        let err = unsafe {
            AXUIElementPerformAction(window.as_CFTypeRef(), action.as_concrete_TypeRef())
        };
        if err != AX_SUCCESS {
            tracing::debug!("AXRaise for PID {} returned {}", pid, err);
        }
        Ok(())
    }

    fn set_position(&self, pid: Pid, position: Point) -> Result<(), PlatformError> {
        let window = first_window(pid)?;
        let point = CGPoint::new(position.x as f64, position.y as f64);
        let value_ref = unsafe {
            AXValueCreate(
                AX_VALUE_CG_POINT_TYPE,
                &point as *const CGPoint as *const c_void,
            )
        };
        if value_ref.is_null() {
            return Err(PlatformError::Unavailable("AXValueCreate".to_string()));
        }
        let value = unsafe { CFType::wrap_under_create_rule(value_ref) };
        let attribute = CFString::from_static_string("AXPosition");
        let code = unsafe {
            AXUIElementSetAttributeValue(
                window.as_CFTypeRef(),
                attribute.as_concrete_TypeRef(),
                value.as_CFTypeRef(),
            )
        };
        if code != AX_SUCCESS {
            return Err(PlatformError::Rejected { code });
        }
        Ok(())
    }
}

impl Backend for MacosPlatform {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn display_source(&self) -> &dyn DisplaySource {
        self
    }

    fn details_source(&self) -> Option<&dyn DisplayDetailsSource> {
        Some(self)
    }

    fn processes(&self) -> &dyn ProcessSource {
        self
    }

    fn windows(&self) -> &dyn WindowControl {
        self
    }
}
