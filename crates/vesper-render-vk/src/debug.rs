// SPDX-License-Identifier: CEPL-1.0
//! Validation-layer messages routed into `tracing` under the `vulkan`
//! target. Diagnostics only: the callback never changes control flow.
use crate::error::{VkCall, VkError};
use ash::ext::debug_utils;
use ash::vk;
use std::ffi::{c_void, CStr};
use tracing::{debug, error, info, warn, Level};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

type Severity = vk::DebugUtilsMessageSeverityFlagsEXT;
type Category = vk::DebugUtilsMessageTypeFlagsEXT;

fn severity_level(severity: Severity) -> Level {
    if severity.contains(Severity::ERROR) {
        Level::ERROR
    } else if severity.contains(Severity::WARNING) {
        Level::WARN
    } else if severity.contains(Severity::INFO) {
        Level::INFO
    } else {
        Level::DEBUG
    }
}

fn category_tag(types: Category) -> &'static str {
    if types.contains(Category::VALIDATION) {
        "validation"
    } else if types.contains(Category::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}

unsafe extern "system" fn debug_callback(
    severity: Severity,
    types: Category,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*data).p_message).to_string_lossy();
    let tag = category_tag(types);
    let level = severity_level(severity);
    if level == Level::ERROR {
        error!(target: "vulkan", "[{tag}] {message}");
    } else if level == Level::WARN {
        warn!(target: "vulkan", "[{tag}] {message}");
    } else if level == Level::INFO {
        info!(target: "vulkan", "[{tag}] {message}");
    } else {
        debug!(target: "vulkan", "[{tag}] {message}");
    }
    vk::FALSE
}

pub struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub unsafe fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self, VkError> {
        let loader = debug_utils::Instance::new(entry, instance);
        let info = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: Severity::VERBOSE
                | Severity::INFO
                | Severity::WARNING
                | Severity::ERROR,
            message_type: Category::GENERAL | Category::VALIDATION | Category::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        let messenger = loader
            .create_debug_utils_messenger(&info, None)
            .call("vkCreateDebugUtilsMessengerEXT")?;
        Ok(Self { loader, messenger })
    }

    /// Must run before the instance is destroyed.
    pub unsafe fn destroy(self) {
        self.loader
            .destroy_debug_utils_messenger(self.messenger, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_severe_bit_wins() {
        assert_eq!(severity_level(Severity::ERROR | Severity::WARNING), Level::ERROR);
        assert_eq!(severity_level(Severity::WARNING), Level::WARN);
        assert_eq!(severity_level(Severity::INFO), Level::INFO);
        assert_eq!(severity_level(Severity::VERBOSE), Level::DEBUG);
    }

    #[test]
    fn tags_categories() {
        assert_eq!(category_tag(Category::VALIDATION | Category::GENERAL), "validation");
        assert_eq!(category_tag(Category::PERFORMANCE), "performance");
        assert_eq!(category_tag(Category::GENERAL), "general");
    }

    #[test]
    fn callback_ignores_null_data() {
        let ret = unsafe {
            debug_callback(
                Severity::ERROR,
                Category::VALIDATION,
                std::ptr::null(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(ret, vk::FALSE);
    }
}
