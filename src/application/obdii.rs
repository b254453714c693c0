use std::fmt;

use super::ServiceTable;
use crate::error::{Result, SimError};
use crate::transport::{Addressing, IsoTpMessage};

// OBD-II Service IDs
pub const SID_SHOW_CURRENT_DATA: u8 = 0x01;
pub const SID_SHOW_FREEZE_FRAME: u8 = 0x02;
pub const SID_SHOW_STORED_DTC: u8 = 0x03;
pub const SID_CLEAR_DTC: u8 = 0x04;
pub const SID_REQUEST_VEHICLE_INFO: u8 = 0x09;

/// Added to a service id in its positive response
pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

// OBD-II PIDs
pub const PID_SUPPORTED_PIDS_01_20: u8 = 0x00;
pub const PID_ENGINE_LOAD: u8 = 0x04;
pub const PID_ENGINE_COOLANT_TEMP: u8 = 0x05;
pub const PID_ENGINE_RPM: u8 = 0x0C;
pub const PID_VEHICLE_SPEED: u8 = 0x0D;
pub const PID_INTAKE_AIR_TEMP: u8 = 0x0F;
pub const PID_THROTTLE_POS: u8 = 0x11;

/// OBD-II services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObdService {
    CurrentData,
    FreezeFrame,
    StoredDtc,
    ClearDtc,
    VehicleInfo,
}

impl ObdService {
    pub fn id(self) -> u8 {
        match self {
            ObdService::CurrentData => SID_SHOW_CURRENT_DATA,
            ObdService::FreezeFrame => SID_SHOW_FREEZE_FRAME,
            ObdService::StoredDtc => SID_SHOW_STORED_DTC,
            ObdService::ClearDtc => SID_CLEAR_DTC,
            ObdService::VehicleInfo => SID_REQUEST_VEHICLE_INFO,
        }
    }

    /// Service id of a positive response
    pub fn response_id(self) -> u8 {
        self.id() + POSITIVE_RESPONSE_OFFSET
    }
}

impl TryFrom<u8> for ObdService {
    type Error = SimError;

    fn try_from(sid: u8) -> Result<Self> {
        match sid {
            SID_SHOW_CURRENT_DATA => Ok(ObdService::CurrentData),
            SID_SHOW_FREEZE_FRAME => Ok(ObdService::FreezeFrame),
            SID_SHOW_STORED_DTC => Ok(ObdService::StoredDtc),
            SID_CLEAR_DTC => Ok(ObdService::ClearDtc),
            SID_REQUEST_VEHICLE_INFO => Ok(ObdService::VehicleInfo),
            _ => Err(SimError::Obd(format!("unknown service 0x{:02X}", sid))),
        }
    }
}

/// OBD-II PID Data
#[derive(Debug, Clone, PartialEq)]
pub enum PidData {
    SupportedPids([u8; 4]), // Bitmap of PIDs 0x01-0x20
    EngineLoad(f32),        // Percentage
    CoolantTemp(i32),       // Celsius
    EngineRpm(f32),         // RPM
    VehicleSpeed(u32),      // km/h
    IntakeAirTemp(i32),     // Celsius
    ThrottlePosition(f32),  // Percentage
    Raw(Vec<u8>),           // Raw data
}

fn require(data: &[u8], len: usize) -> Result<()> {
    if data.len() < len {
        return Err(SimError::Obd("Invalid data length".into()));
    }
    Ok(())
}

fn out_of_range<T: fmt::Display>(what: &str, value: T) -> SimError {
    SimError::Obd(format!("{} {} cannot be encoded", what, value))
}

impl PidData {
    /// Converts raw OBD-II data to meaningful values
    pub fn from_raw(pid: u8, data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(SimError::Obd("Empty data".into()));
        }

        match pid {
            PID_SUPPORTED_PIDS_01_20 => {
                require(data, 4)?;
                Ok(PidData::SupportedPids([data[0], data[1], data[2], data[3]]))
            }

            PID_ENGINE_LOAD => Ok(PidData::EngineLoad(data[0] as f32 * 100.0 / 255.0)),

            PID_ENGINE_COOLANT_TEMP => Ok(PidData::CoolantTemp(data[0] as i32 - 40)),

            PID_ENGINE_RPM => {
                require(data, 2)?;
                let value = ((data[0] as u32 * 256 + data[1] as u32) as f32) / 4.0;
                Ok(PidData::EngineRpm(value.round()))
            }

            PID_VEHICLE_SPEED => Ok(PidData::VehicleSpeed(data[0] as u32)),

            PID_INTAKE_AIR_TEMP => Ok(PidData::IntakeAirTemp(data[0] as i32 - 40)),

            PID_THROTTLE_POS => Ok(PidData::ThrottlePosition(data[0] as f32 * 100.0 / 255.0)),

            _ => Ok(PidData::Raw(data.to_vec())),
        }
    }

    /// Converts a value back to the bytes an ECU reports
    pub fn to_raw(&self) -> Result<Vec<u8>> {
        match self {
            PidData::SupportedPids(bitmap) => Ok(bitmap.to_vec()),
            PidData::EngineLoad(v) | PidData::ThrottlePosition(v) => {
                if !(0.0..=100.0).contains(v) {
                    return Err(out_of_range("percentage", v));
                }
                Ok(vec![(v * 255.0 / 100.0).round() as u8])
            }
            PidData::CoolantTemp(v) | PidData::IntakeAirTemp(v) => {
                let raw = u8::try_from(v + 40).map_err(|_| out_of_range("temperature", v))?;
                Ok(vec![raw])
            }
            PidData::EngineRpm(v) => {
                let raw = (v * 4.0).round();
                if !(0.0..=u16::MAX as f32).contains(&raw) {
                    return Err(out_of_range("engine speed", v));
                }
                Ok((raw as u16).to_be_bytes().to_vec())
            }
            PidData::VehicleSpeed(v) => {
                let raw = u8::try_from(*v).map_err(|_| out_of_range("vehicle speed", v))?;
                Ok(vec![raw])
            }
            PidData::Raw(data) => Ok(data.clone()),
        }
    }
}

impl fmt::Display for PidData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PidData::SupportedPids(v) => write!(f, "Supported: {:02X?}", v),
            PidData::EngineLoad(v) => write!(f, "{:.1}%", v),
            PidData::CoolantTemp(v) => write!(f, "{}°C", v),
            PidData::EngineRpm(v) => write!(f, "{:.0} RPM", v),
            PidData::VehicleSpeed(v) => write!(f, "{} km/h", v),
            PidData::IntakeAirTemp(v) => write!(f, "{}°C", v),
            PidData::ThrottlePosition(v) => write!(f, "{:.1}%", v),
            PidData::Raw(data) => write!(f, "Raw: {:02X?}", data),
        }
    }
}

/// Bitmap answering PID 0x00 for the given PIDs in 0x01..=0x20
pub fn supported_pids_bitmap(pids: &[u8]) -> [u8; 4] {
    let mut bitmap = [0u8; 4];
    for &pid in pids.iter().filter(|pid| (0x01..=0x20).contains(*pid)) {
        let index = (pid - 1) as usize;
        bitmap[index / 8] |= 0x80 >> (index % 8);
    }
    bitmap
}

/// Decodes the value carried by a positive OBD-II response.
pub fn decode_response(response: &IsoTpMessage) -> Result<PidData> {
    let sid = response
        .service_id
        .checked_sub(POSITIVE_RESPONSE_OFFSET)
        .ok_or_else(|| {
            SimError::Obd(format!(
                "0x{:02X} is not a positive response",
                response.service_id
            ))
        })?;

    match ObdService::try_from(sid)? {
        ObdService::CurrentData => PidData::from_raw(response.parameter_id, &response.data),
        // first byte is the frame number
        ObdService::FreezeFrame => {
            require(&response.data, 2)?;
            PidData::from_raw(response.parameter_id, &response.data[1..])
        }
        _ => Ok(PidData::Raw(response.data.clone())),
    }
}

/// Engine control unit answering services 0x01 and 0x02.
///
/// Current data is served on both addressing modes. Freeze frames are only
/// served to physically addressed requests.
#[derive(Debug, Clone)]
pub struct EngineEcu {
    pub rpm: f32,
    pub vehicle_speed: u32,
    pub coolant_temp: i32,
    pub freeze_frame_rpm: f32,
}

impl Default for EngineEcu {
    fn default() -> Self {
        Self {
            rpm: 1750.0,
            vehicle_speed: 50,
            coolant_temp: 90,
            freeze_frame_rpm: 3000.0,
        }
    }
}

impl EngineEcu {
    pub const SUPPORTED_PIDS: [u8; 3] = [PID_ENGINE_COOLANT_TEMP, PID_ENGINE_RPM, PID_VEHICLE_SPEED];

    fn current_data(&self, pid: u8) -> Option<PidData> {
        match pid {
            PID_SUPPORTED_PIDS_01_20 => Some(PidData::SupportedPids(supported_pids_bitmap(
                &Self::SUPPORTED_PIDS,
            ))),
            PID_ENGINE_COOLANT_TEMP => Some(PidData::CoolantTemp(self.coolant_temp)),
            PID_ENGINE_RPM => Some(PidData::EngineRpm(self.rpm)),
            PID_VEHICLE_SPEED => Some(PidData::VehicleSpeed(self.vehicle_speed)),
            _ => None,
        }
    }

    fn freeze_frame(&self, pid: u8) -> Option<PidData> {
        match pid {
            PID_ENGINE_RPM => Some(PidData::EngineRpm(self.freeze_frame_rpm)),
            _ => None,
        }
    }
}

impl ServiceTable for EngineEcu {
    fn respond(&mut self, addressing: Addressing, request: &IsoTpMessage) -> Option<IsoTpMessage> {
        let service = ObdService::try_from(request.service_id).ok()?;
        let pid = request.parameter_id;

        let data = match (service, addressing) {
            (ObdService::CurrentData, _) => self.current_data(pid)?.to_raw().ok()?,
            (ObdService::FreezeFrame, Addressing::Physical) => {
                // only frame 0 is stored
                let frame_no = request.data.first().copied().unwrap_or(0);
                if frame_no != 0 {
                    return None;
                }
                let mut data = vec![frame_no];
                data.extend(self.freeze_frame(pid)?.to_raw().ok()?);
                data
            }
            _ => return None,
        };

        Some(IsoTpMessage::new(service.response_id(), pid, &data))
    }
}
