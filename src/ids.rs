//! String tables for identifiers found in controller responses and persisted
//! records: link-layer protocol versions and manufacturer ids. The full OUI
//! company database lives outside the daemon; callers plug one in through
//! [`OuiResolver`].

use crate::Address;

/// Protocol version codes as they appear in stored `manufacturers` records.
pub fn lmp_version_str(version: u8) -> &'static str {
    match version {
        0 => "1.0b",
        1 => "1.1",
        2 => "1.2",
        3 => "2.0",
        4 | 8 => "2.1",
        5 => "3.0",
        6 => "4.0",
        7 => "4.1",
        9 => "5.0",
        _ => "not assigned",
    }
}

/// Manufacturer names for the company ids assigned by the SIG. Only the ids
/// that actually show up in stored records of deployed controllers are
/// carried here.
pub fn company_str(company: u16) -> &'static str {
    match company {
        0 => "Ericsson Technology Licensing",
        1 => "Nokia Mobile Phones",
        2 => "Intel Corp.",
        3 => "IBM Corp.",
        4 => "Toshiba Corp.",
        5 => "3Com",
        6 => "Microsoft",
        7 => "Lucent",
        8 => "Motorola",
        9 => "Infineon Technologies AG",
        10 => "Cambridge Silicon Radio",
        11 => "Silicon Wave",
        12 => "Digianswer A/S",
        13 => "Texas Instruments Inc.",
        14 => "Parthus Technologies Inc.",
        15 => "Broadcom Corporation",
        16 => "Mitel Semiconductor",
        17 => "Widcomm, Inc.",
        18 => "Zeevo, Inc.",
        19 => "Atmel Corporation",
        20 => "Mitsubishi Electric Corporation",
        21 => "RTX Telecom A/S",
        22 => "KC Technology Inc.",
        23 => "Newlogic",
        24 => "Transilica, Inc.",
        25 => "Ericsson Mobile Platforms",
        _ => "not assigned",
    }
}

/// Resolves the company behind an address prefix. The daemon itself does not
/// embed the OUI registry; embedders supply it.
pub trait OuiResolver: Send + Sync {
    fn company_for(&self, address: Address) -> Option<String>;
}

/// Resolver used when no OUI registry has been wired up; every lookup misses.
pub struct NoOuiDb;

impl OuiResolver for NoOuiDb {
    fn company_for(&self, _address: Address) -> Option<String> {
        None
    }
}
