//! Bluetooth LE scanning functionality
//!
//! This module provides functions for scanning for Bluetooth LE devices.

use crate::error::HciError;
use crate::hci::{HciCommand, HciSocket, LeAdvertisingReport};
use std::thread;
use std::time::Duration;

/// Scan for Bluetooth LE devices
///
/// This function starts a scan for Bluetooth LE devices and calls the provided
/// callback for each advertisement received.
///
/// # Arguments
///
/// * `socket` - The HCI socket to use for scanning
/// * `duration` - How long to scan for
/// * `callback` - Function to call for each advertisement
///
/// # Returns
///
/// A result indicating success or failure
pub fn scan_le<F>(socket: &HciSocket, duration: Duration, _callback: F) -> Result<(), HciError>
where
    F: FnMut(&LeAdvertisingReport),
{
    // Set scan parameters (active scanning, 10ms interval, 10ms window)
    socket.send_command(&HciCommand::LeSetScanParameters {
        scan_type: 1,          // 0 = passive, 1 = active
        scan_interval: 0x0010, // 10ms in 0.625ms units (0x0010 * 0.625 = 10ms)
        scan_window: 0x0010,   // 10ms in 0.625ms units
        own_address_type: 0,   // Public Device Address
        filter_policy: 0,      // Accept all advertisements
    })?;

    // Enable scanning
    socket.send_command(&HciCommand::LeSetScanEnable {
        enable: true,
        filter_duplicates: true,
    })?;

    // We need to implement a read function to read events from the socket
    // This is a simplified approach for now
    // TODO: Implement proper async event handling

    // Start the scan for the specified duration
    thread::sleep(duration);

    // Disable scanning
    socket.send_command(&HciCommand::LeSetScanEnable {
        enable: false,
        filter_duplicates: false,
    })?;

    Ok(())
}

/// Parse advertisement data from a LE Advertising Report
///
/// # Arguments
///
/// * `data` - The advertisement data
///
/// # Returns
///
/// A vector of (type, data) tuples
pub fn parse_advertising_data(data: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i] as usize;
        if length == 0 || i + length >= data.len() {
            break;
        }

        let ad_type = data[i + 1];
        let ad_data = data[i + 2..i + 1 + length].to_vec();

        result.push((ad_type, ad_data));

        i += 1 + length;
    }

    result
}
