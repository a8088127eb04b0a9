//! Payload decoding for centroid and raw frames.

use crate::device::DeviceType;
use crate::state::{DecodedState, TouchEvent};

/// Location value marking an unused touch slot.
const NO_TOUCH: u16 = 0xFFFF;

/// Full scale of a raw channel reading.
const RAW_FULL_SCALE: f32 = 4095.0;

fn word(payload: &[u8], index: usize) -> u16 {
    u16::from_be_bytes([payload[2 * index], payload[2 * index + 1]])
}

fn normalize(value: u16, scale: f32) -> f32 {
    (value as f32 / scale).clamp(0.0, 1.0)
}

/// Number of leading slots in a location block that hold a touch.
fn count_touches(payload: &[u8], first_word: usize, slots: usize) -> usize {
    (0..slots)
        .take_while(|&slot| word(payload, first_word + slot) != NO_TOUCH)
        .count()
}

/// Decodes a payload of `device.payload_len(state.mode())` bytes into `state`,
/// keeping its variant.
///
/// `payload` must be exactly as long as the device's payload for the mode.
pub fn decode_into(device: DeviceType, payload: &[u8], state: &mut DecodedState) {
    match state {
        DecodedState::Centroid(touches) => {
            touches.clear();
            let slots = device.max_touches();
            let vertical = count_touches(payload, 0, slots);
            let count = if device.is_2d() {
                vertical.min(count_touches(payload, 2 * slots, slots))
            } else {
                vertical
            };

            for i in 0..count {
                let horizontal_location = device
                    .is_2d()
                    .then(|| normalize(word(payload, 2 * slots + i), device.horizontal_scale()));
                let touch = TouchEvent {
                    location: normalize(word(payload, i), device.vertical_scale()),
                    horizontal_location,
                    size: normalize(word(payload, slots + i), device.size_scale()),
                };
                // `count` never exceeds the device's slots, which fit MAX_TOUCHES.
                let _ = touches.push(touch);
            }
        }
        DecodedState::Raw(readings) => {
            for (i, reading) in readings.iter_mut().enumerate() {
                *reading = normalize(word(payload, i), RAW_FULL_SCALE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DecodeMode;

    fn payload(words: &[u16]) -> std::vec::Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn bar_with_two_touches() {
        let bytes = payload(&[
            1600, 3200, NO_TOUCH, NO_TOUCH, NO_TOUCH, // locations
            2500, 5000, 0, 0, 0, // sizes
        ]);
        let mut state = DecodedState::empty(DecodeMode::Centroid, 26);
        decode_into(DeviceType::Bar, &bytes, &mut state);

        let touches = state.touches().unwrap();
        assert_eq!(touches.len(), 2);
        assert_eq!(touches[0].location, 0.5);
        assert_eq!(touches[0].size, 0.5);
        assert_eq!(touches[1].location, 1.0);
        assert!(touches.iter().all(|t| t.horizontal_location.is_none()));
    }

    #[test]
    fn touch_count_follows_each_frame() {
        let mut state = DecodedState::empty(DecodeMode::Centroid, 26);
        let three = payload(&[10, 20, 30, NO_TOUCH, NO_TOUCH, 1, 1, 1, 0, 0]);
        decode_into(DeviceType::Bar, &three, &mut state);
        assert_eq!(state.touches().unwrap().len(), 3);

        let none = payload(&[NO_TOUCH; 10]);
        decode_into(DeviceType::Bar, &none, &mut state);
        assert_eq!(state.touches().unwrap().len(), 0);
    }

    #[test]
    fn out_of_range_locations_are_clamped() {
        let bytes = payload(&[0xFFFE, NO_TOUCH, NO_TOUCH, NO_TOUCH, NO_TOUCH, 0xFFFE, 0, 0, 0, 0]);
        let mut state = DecodedState::empty(DecodeMode::Centroid, 28);
        decode_into(DeviceType::Ring, &bytes, &mut state);
        let touch = state.touches().unwrap()[0];
        assert_eq!(touch.location, 1.0);
        assert_eq!(touch.size, 1.0);
    }

    #[test]
    fn square_pairs_vertical_and_horizontal_blocks() {
        let bytes = payload(&[
            896, 1792, NO_TOUCH, NO_TOUCH, // vertical locations
            100, 100, 0, 0, // vertical sizes
            0, NO_TOUCH, NO_TOUCH, NO_TOUCH, // horizontal locations
            100, 0, 0, 0, // horizontal sizes
        ]);
        let mut state = DecodedState::empty(DecodeMode::Centroid, 30);
        decode_into(DeviceType::Square, &bytes, &mut state);

        let touches = state.touches().unwrap();
        assert_eq!(touches.len(), 1);
        assert_eq!(touches[0].location, 0.5);
        assert_eq!(touches[0].horizontal_location, Some(0.0));
    }

    #[test]
    fn hex_scales_each_axis_by_its_own_pad_count() {
        let bytes = payload(&[
            960, 1920, 100, NO_TOUCH, // vertical locations
            800, 800, 800, 0, // vertical sizes
            832, 1664, NO_TOUCH, NO_TOUCH, // horizontal locations
            1600, 3200, 0, 0, // horizontal sizes
        ]);
        let mut state = DecodedState::empty(DecodeMode::Centroid, 30);
        decode_into(DeviceType::Hex, &bytes, &mut state);

        let touches = state.touches().unwrap();
        assert_eq!(touches.len(), 2);
        assert_eq!(touches[0].location, 0.5);
        assert_eq!(touches[0].horizontal_location, Some(0.5));
        assert_eq!(touches[1].location, 1.0);
        assert_eq!(touches[1].horizontal_location, Some(1.0));
        assert_eq!(touches[0].size, 0.25);

        let mut line: heapless::String<64> = heapless::String::new();
        state.write_report(&mut line).unwrap();
        assert_eq!(line.as_str(), "Touches: 2:0.500 0.500 1.000 1.000 \n");
    }

    #[test]
    fn raw_frame_has_one_reading_per_channel() {
        let device = DeviceType::Craft;
        let words: std::vec::Vec<u16> = (0..device.channel_count() as u16)
            .map(|i| i * 100)
            .collect();
        let mut state = DecodedState::empty(DecodeMode::Raw, device.channel_count());
        decode_into(device, &payload(&words), &mut state);

        let readings = state.channels().unwrap();
        assert_eq!(readings.len(), 30);
        assert_eq!(readings[0], 0.0);
        assert!((readings[1] - 100.0 / 4095.0).abs() < 1e-6);
        assert!(readings.iter().all(|r| (0.0..=1.0).contains(r)));
    }
}
