//! Decoding of the 24-bit class-of-device value into the textual names the
//! bus surface exposes. The field layout differs per major class, so each
//! major carries its own shift and mask.

pub const SERVICE_CLASSES: [&str; 8] = [
    "positioning",
    "networking",
    "rendering",
    "capturing",
    "object transfer",
    "audio",
    "telephony",
    "information",
];

pub const MAJOR_CLASSES: [&str; 10] = [
    "miscellaneous",
    "computer",
    "phone",
    "access point",
    "audio/video",
    "peripheral",
    "imaging",
    "wearable",
    "toy",
    "uncategorized",
];

pub const COMPUTER_MINOR_CLASSES: [&str; 7] = [
    "uncategorized",
    "desktop",
    "server",
    "laptop",
    "handheld",
    "palm",
    "wearable",
];

pub const PHONE_MINOR_CLASSES: [&str; 6] = [
    "uncategorized",
    "cellular",
    "cordless",
    "smart phone",
    "modem",
    "isdn",
];

const ACCESS_POINT_MINOR_CLASSES: [&str; 8] = [
    "fully",
    "1-17 percent",
    "17-33 percent",
    "33-50 percent",
    "50-67 percent",
    "67-83 percent",
    "83-99 percent",
    "not available",
];

const AUDIO_VIDEO_MINOR_CLASSES: [&str; 19] = [
    "uncategorized",
    "headset",
    "handsfree",
    "unknown",
    "microphone",
    "loudspeaker",
    "headphones",
    "portable audio",
    "car audio",
    "set-top box",
    "hifi audio",
    "vcr",
    "video camera",
    "camcorder",
    "video monitor",
    "video display and loudspeaker",
    "video conferencing",
    "unknown",
    "gaming/toy",
];

const PERIPHERAL_MINOR_CLASSES: [&str; 4] = ["uncategorized", "keyboard", "pointing", "combo"];

const IMAGING_MINOR_CLASSES: [&str; 4] = ["display", "camera", "scanner", "printer"];

const WEARABLE_MINOR_CLASSES: [&str; 5] = ["wrist watch", "pager", "jacket", "helmet", "glasses"];

const TOY_MINOR_CLASSES: [&str; 5] = ["robot", "vehicle", "doll", "controller", "game"];

/// Major device class name. Indices past the assigned range fall back to
/// "uncategorized".
pub fn major_class_str(class: u32) -> &'static str {
    let index = ((class >> 8) & 0x1F) as usize;

    if index > 8 {
        return MAJOR_CLASSES[9];
    }

    MAJOR_CLASSES[index]
}

/// Minor device class name. The minor field width and position depend on the
/// major class; imaging encodes a bitmask and reports the lowest set bit.
/// Out-of-table indices yield an empty string.
pub fn minor_class_str(class: u32) -> &'static str {
    let minor = |table: &'static [&'static str], index: usize| -> &'static str {
        table.get(index).copied().unwrap_or("")
    };

    match (class >> 8) & 0x1F {
        1 => minor(&COMPUTER_MINOR_CLASSES, ((class >> 2) & 0x3F) as usize),
        2 => minor(&PHONE_MINOR_CLASSES, ((class >> 2) & 0x3F) as usize),
        3 => minor(&ACCESS_POINT_MINOR_CLASSES, ((class >> 5) & 0x07) as usize),
        4 => minor(&AUDIO_VIDEO_MINOR_CLASSES, ((class >> 2) & 0x3F) as usize),
        5 => minor(&PERIPHERAL_MINOR_CLASSES, ((class >> 6) & 0x03) as usize),
        6 => {
            let mask = (class >> 4) & 0x0F;

            for (bit, name) in IMAGING_MINOR_CLASSES.iter().enumerate() {
                if (mask >> bit) & 0x01 == 0x01 {
                    return name;
                }
            }

            ""
        }
        7 => minor(&WEARABLE_MINOR_CLASSES, ((class >> 2) & 0x3F) as usize),
        8 => minor(&TOY_MINOR_CLASSES, ((class >> 2) & 0x3F) as usize),
        _ => "",
    }
}

/// Names of the service classes flagged in bits 16-23, in ascending bit
/// order.
pub fn service_classes_str(class: u32) -> Vec<&'static str> {
    let services = (class >> 16) & 0xFF;

    SERVICE_CLASSES
        .iter()
        .enumerate()
        .filter(|(i, _)| services & (1 << i) != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// Names of the service classes present in the top byte of a raw class
/// triplet, as read from the controller.
pub fn service_classes_from_byte(byte: u8) -> Vec<&'static str> {
    service_classes_str((byte as u32) << 16)
}

/// Index of a computer minor class given its name, matched
/// case-insensitively. The index becomes bits 2-7 of the class value.
pub fn computer_minor_class_index(name: &str) -> Option<u8> {
    COMPUTER_MINOR_CLASSES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| i as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_computer_with_capturing() {
        let class = 0x080104;

        assert_eq!(major_class_str(class), "computer");
        assert_eq!(minor_class_str(class), "desktop");
        assert_eq!(service_classes_str(class), vec!["capturing"]);
    }

    #[test]
    fn major_class_fallback() {
        assert_eq!(major_class_str(0x000900), "uncategorized");
        assert_eq!(major_class_str(0x001F00), "uncategorized");
        assert_eq!(major_class_str(0x000000), "miscellaneous");
    }

    #[test]
    fn minor_shift_per_major() {
        // phone: minor in bits 2-7
        assert_eq!(minor_class_str(0x00020C), "smart phone");
        // access point: minor in bits 5-7
        assert_eq!(minor_class_str(0x000320), "1-17 percent");
        // peripheral: minor in bits 6-7
        assert_eq!(minor_class_str(0x000540), "keyboard");
        // wearable: minor in bits 2-7
        assert_eq!(minor_class_str(0x000704), "wrist watch");
        // toy: minor in bits 2-7
        assert_eq!(minor_class_str(0x000810), "controller");
    }

    #[test]
    fn imaging_reports_lowest_set_bit() {
        // camera and scanner flagged, camera is the lower bit
        assert_eq!(minor_class_str(0x000660), "camera");
        assert_eq!(minor_class_str(0x000690), "display");
        assert_eq!(minor_class_str(0x000600), "");
    }

    #[test]
    fn out_of_table_minor_is_empty() {
        // computer minor index 63 is far past the table
        assert_eq!(minor_class_str(0x0001FC), "");
        // majors without a minor table
        assert_eq!(minor_class_str(0x000900), "");
    }

    #[test]
    fn service_bits_in_ascending_order() {
        let class = 0b1000_0011 << 16;
        assert_eq!(
            service_classes_str(class),
            vec!["positioning", "networking", "information"]
        );
        assert_eq!(service_classes_str(0), Vec::<&str>::new());
    }

    #[test]
    fn minor_name_lookup() {
        assert_eq!(computer_minor_class_index("Laptop"), Some(3));
        assert_eq!(computer_minor_class_index("toaster"), None);
    }
}
