/*!
 # Bluetooth LED strip sink

 Drives an ELK-BLEDOM compatible LED strip (ELK-BLE, LEDBLE, MELK, ELK-BULB,
 ELK-LAMPL) over Bluetooth LE as the light of the sunrise alarm. Only power
 and brightness are used; colour and effects stay whatever the strip was set
 to.
*/

use btleplug::api::{
    CharPropFlags, Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use crate::sink::BrightnessSink;
use crate::{Error, Result};

/// Maximum time to wait for device discovery
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
/// Attempts per command before giving up
const MAX_RETRIES: u8 = 3;
/// Pause after each command so the strip can process it; 15 ms is the
/// lowest the strips accept
const COMMAND_DELAY: Duration = Duration::from_millis(15);

const FFF3_WRITE: Uuid = Uuid::from_u128(0x0000fff3_0000_1000_8000_00805f9b34fb);
const FFE1_WRITE: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);

/// Supported strip families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceType {
    ElkBle,
    LedBle,
    Melk,
    ElkBulb,
    ElkLampl,
}

impl DeviceType {
    fn from_name(name: &str) -> Option<Self> {
        if name.starts_with("ELK-BLE") {
            Some(DeviceType::ElkBle)
        } else if name.starts_with("LEDBLE") {
            Some(DeviceType::LedBle)
        } else if name.starts_with("MELK") {
            Some(DeviceType::Melk)
        } else if name.starts_with("ELK-BULB") {
            Some(DeviceType::ElkBulb)
        } else if name.starts_with("ELK-LAMPL") {
            Some(DeviceType::ElkLampl)
        } else {
            None
        }
    }

    fn write_uuid(self) -> Uuid {
        match self {
            DeviceType::LedBle => FFE1_WRITE,
            _ => FFF3_WRITE,
        }
    }

    fn turn_on_cmd(self) -> [u8; 9] {
        match self {
            DeviceType::ElkBle => [0x7e, 0x00, 0x04, 0xf0, 0x00, 0x01, 0xff, 0x00, 0xef],
            _ => [0x7e, 0x00, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0xef],
        }
    }

    fn turn_off_cmd(self) -> [u8; 9] {
        [0x7e, 0x00, 0x04, 0x00, 0x00, 0x00, 0xff, 0x00, 0xef]
    }
}

fn brightness_cmd(percent: u8) -> [u8; 9] {
    [0x7e, 0x00, 0x01, percent, 0x00, 0x00, 0x00, 0x00, 0xef]
}

/// What the sink believes the strip currently shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct StripState {
    is_on: Option<bool>,
    brightness: Option<u8>,
}

impl StripState {
    /// Frames that bring the strip to `percent` (already limited to 0-100),
    /// together with the state afterwards.
    ///
    /// The level is written before the strip is switched on, so it never
    /// lights up at the level it had when it was switched off. The level is
    /// forgotten on power off.
    fn frames_for(self, device_type: DeviceType, percent: u8) -> (Vec<[u8; 9]>, StripState) {
        let mut frames = Vec::new();

        if percent == 0 {
            if self.is_on != Some(false) {
                frames.push(device_type.turn_off_cmd());
            }
            let off = StripState {
                is_on: Some(false),
                brightness: None,
            };
            return (frames, off);
        }

        if self.brightness != Some(percent) {
            frames.push(brightness_cmd(percent));
        }
        if self.is_on != Some(true) {
            frames.push(device_type.turn_on_cmd());
        }
        let on = StripState {
            is_on: Some(true),
            brightness: Some(percent),
        };
        (frames, on)
    }
}

/// Gets the default Bluetooth adapter
#[instrument(skip(manager))]
async fn get_central(manager: &Manager) -> Result<Adapter> {
    debug!("Getting default Bluetooth adapter");
    manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            error!("No Bluetooth adapters found");
            Error::NoBluetoothAdapters
        })
}

/// Does the peripheral match the requested address or id (any, if none)?
fn matches_address(peripheral: &Peripheral, addr: Option<&str>) -> bool {
    match addr {
        None => true,
        Some(addr) => {
            let addr = addr.to_lowercase();
            peripheral.address().to_string().to_lowercase() == addr
                || peripheral.id().to_string().to_lowercase() == addr
        }
    }
}

/// Brightness sink backed by a Bluetooth LED strip
pub struct BleSink {
    peripheral: Peripheral,
    write_characteristic: Characteristic,
    device_type: DeviceType,
    state: StripState,
}

impl BleSink {
    /// Scans for a compatible strip and connects to it.
    ///
    /// With `addr` only the device with that MAC address or platform id is
    /// accepted, otherwise the first compatible device found.
    #[instrument]
    pub async fn connect(addr: Option<&str>) -> Result<Self> {
        info!("Initializing BLE LED strip");
        let manager = Manager::new().await?;
        let central = get_central(&manager).await?;

        info!("Scanning for compatible BLE devices...");
        central.start_scan(ScanFilter::default()).await?;

        let start_time = std::time::Instant::now();
        let mut found: Option<(Peripheral, DeviceType)> = None;

        while found.is_none() && start_time.elapsed() < DISCOVERY_TIMEOUT {
            let peripherals = central.peripherals().await?;
            debug!("Found {} BLE peripherals so far", peripherals.len());

            for p in peripherals {
                if !matches_address(&p, addr) {
                    continue;
                }
                let Ok(Some(props)) = p.properties().await else {
                    continue;
                };
                let Some(name) = props.local_name else {
                    continue;
                };
                match DeviceType::from_name(&name) {
                    Some(device_type) => {
                        info!("Found compatible device: {} (type: {:?})", name, device_type);
                        found = Some((p, device_type));
                        break;
                    }
                    None if addr.is_some() => {
                        error!("Device {} is not a compatible LED strip", name);
                        central.stop_scan().await?;
                        return Err(Error::NoCompatibleDevice);
                    }
                    None => trace!("Skipping incompatible device {}", name),
                }
            }

            if found.is_none() {
                let remaining = DISCOVERY_TIMEOUT.saturating_sub(start_time.elapsed());
                info!(
                    "Still scanning for compatible devices... ({} seconds remaining)",
                    remaining.as_secs()
                );
                time::sleep(Duration::from_millis(500)).await;
            }
        }

        central.stop_scan().await?;
        let Some((peripheral, device_type)) = found else {
            error!(
                "No compatible LED device found within {} seconds",
                DISCOVERY_TIMEOUT.as_secs()
            );
            return Err(Error::NoCompatibleDevice);
        };

        info!("Connecting to device...");
        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        debug!("Discovering services...");
        peripheral.discover_services().await?;

        let write_uuid = device_type.write_uuid();
        let write_characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == write_uuid)
            .ok_or_else(|| Error::CharacteristicNotFound(write_uuid.to_string()))?;
        debug!("Found write characteristic: {}", write_characteristic.uuid);

        Ok(Self {
            peripheral,
            write_characteristic,
            device_type,
            state: StripState::default(),
        })
    }

    /// Writes a command, retrying a few times since BLE is unreliable
    #[instrument(skip(self, command), fields(cmd_length = command.len()))]
    async fn send_command(&self, command: &[u8]) -> Result<()> {
        let write_type = if self
            .write_characteristic
            .properties
            .contains(CharPropFlags::WRITE)
        {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        for attempt in 1..=MAX_RETRIES {
            trace!("Sending BLE command (attempt {}/{})", attempt, MAX_RETRIES);
            match self
                .peripheral
                .write(&self.write_characteristic, command, write_type)
                .await
            {
                Ok(()) => {
                    time::sleep(COMMAND_DELAY).await;
                    return Ok(());
                }
                Err(e) if attempt < MAX_RETRIES => {
                    warn!("Command failed (attempt {}/{}): {}", attempt, MAX_RETRIES, e);
                    time::sleep(Duration::from_millis(300)).await;
                }
                Err(e) => {
                    error!("Command failed permanently: {}", e);
                    return Err(Error::BleError(e.to_string()));
                }
            }
        }
        Err(Error::CommandTimeout(MAX_RETRIES))
    }
}

impl BrightnessSink for BleSink {
    #[instrument(skip(self))]
    async fn set(&mut self, percent: u8) -> Result<()> {
        let limited = percent.min(100);
        if percent > 100 {
            warn!("Brightness value {} out of range (0-100), limiting to 100", percent);
        }

        let (frames, next) = self.state.frames_for(self.device_type, limited);
        for frame in &frames {
            self.send_command(frame).await?;
        }

        if next.is_on != self.state.is_on {
            info!("LED strip powered {}", if limited > 0 { "on" } else { "off" });
        }
        if limited > 0 && next.brightness != self.state.brightness {
            debug!("Brightness set to {}%", limited);
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_names() {
        assert_eq!(DeviceType::from_name("ELK-BLEDOM"), Some(DeviceType::ElkBle));
        assert_eq!(DeviceType::from_name("ELK-BULB2"), Some(DeviceType::ElkBulb));
        assert_eq!(DeviceType::from_name("LEDBLE-1234"), Some(DeviceType::LedBle));
        assert_eq!(DeviceType::from_name("Headphones"), None);
    }

    #[test]
    fn command_frames() {
        assert_eq!(brightness_cmd(42), [0x7e, 0x00, 0x01, 42, 0x00, 0x00, 0x00, 0x00, 0xef]);
        assert_eq!(DeviceType::LedBle.write_uuid().to_string(), "0000ffe1-0000-1000-8000-00805f9b34fb");
        assert_eq!(DeviceType::Melk.write_uuid().to_string(), "0000fff3-0000-1000-8000-00805f9b34fb");
    }

    #[test]
    fn sunrise_after_power_off_starts_dim() {
        let device = DeviceType::ElkBle;
        let state = StripState::default();

        // Yesterday's sunrise ended at full brightness
        let (frames, state) = state.frames_for(device, 100);
        assert_eq!(frames, vec![brightness_cmd(100), device.turn_on_cmd()]);
        let (frames, state) = state.frames_for(device, 100);
        assert!(frames.is_empty());

        let (frames, state) = state.frames_for(device, 0);
        assert_eq!(frames, vec![device.turn_off_cmd()]);
        assert_eq!(state.brightness, None);
        let (frames, state) = state.frames_for(device, 0);
        assert!(frames.is_empty());

        // The next ramp writes its first level before switching on
        let (frames, state) = state.frames_for(device, 1);
        assert_eq!(frames, vec![brightness_cmd(1), device.turn_on_cmd()]);
        let (frames, _) = state.frames_for(device, 2);
        assert_eq!(frames, vec![brightness_cmd(2)]);
    }
}
