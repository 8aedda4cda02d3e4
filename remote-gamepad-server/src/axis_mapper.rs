use crate::config::{AxesConfig, AxisConfig, Orientation};
use remote_gamepad_common::{ControllerFrame, DPad, AXIS_MAX, AXIS_MIN};

/// Where the value of a virtual axis came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AxisSource {
    Stick,
    DPad,
}

/// The virtual stick position derived from one frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StickPosition {
    pub x: i16,
    pub y: i16,
    pub x_source: AxisSource,
    pub y_source: AxisSource,
}

/// Projects raw handheld readings onto the virtual device's axis range.
///
/// Each axis is arbitrated separately: a stick reading inside the dead zone
/// gives way to the d-pad bits of that axis, anything outside it wins over
/// the d-pad. When both opposing d-pad bits are set the negative direction
/// (left, up) wins.
#[derive(Copy, Clone, Debug)]
pub struct AxisMapper {
    axes: AxesConfig,
}

impl AxisMapper {
    pub fn new(axes: AxesConfig) -> Self {
        Self { axes }
    }

    pub fn map(&self, frame: &ControllerFrame) -> StickPosition {
        let (x, x_source) = map_axis(
            &self.axes.x,
            frame.stick_x,
            frame.dpad,
            DPad::LEFT,
            DPad::RIGHT,
        );
        let (y, y_source) = map_axis(&self.axes.y, frame.stick_y, frame.dpad, DPad::UP, DPad::DOWN);

        StickPosition {
            x,
            y,
            x_source,
            y_source,
        }
    }
}

fn map_axis(
    axis: &AxisConfig,
    raw: i16,
    dpad: DPad,
    negative: DPad,
    positive: DPad,
) -> (i16, AxisSource) {
    if !axis.is_active(raw) {
        let value = if dpad.contains(negative) {
            AXIS_MIN
        } else if dpad.contains(positive) {
            AXIS_MAX
        } else {
            0
        };
        return (value, AxisSource::DPad);
    }

    (axis.scale(raw), AxisSource::Stick)
}

impl AxisConfig {
    /// Whether the stick is outside the dead zone. A reading exactly at the
    /// threshold counts as active.
    pub fn is_active(&self, raw: i16) -> bool {
        raw.unsigned_abs() >= self.dead_zone
    }

    /// Clamps `raw` to the physical range and linearly interpolates it onto
    /// `[AXIS_MIN, AXIS_MAX]`.
    pub fn scale(&self, raw: i16) -> i16 {
        let min = i64::from(self.physical_min);
        let max = i64::from(self.physical_max);
        let clamped = i64::from(raw).clamp(min, max);

        let span = i64::from(AXIS_MAX) - i64::from(AXIS_MIN);
        let scaled = (clamped - min) * span / (max - min) + i64::from(AXIS_MIN);

        let value = match self.orientation {
            Orientation::Normal => scaled,
            // Mirror around the center so the ends swap exactly
            Orientation::Inverted => i64::from(AXIS_MAX) + i64::from(AXIS_MIN) - scaled,
        };

        value as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_gamepad_common::Buttons;

    fn frame(stick_x: i16, stick_y: i16, dpad: DPad) -> ControllerFrame {
        ControllerFrame {
            stick_x,
            stick_y,
            buttons: Buttons::empty(),
            dpad,
        }
    }

    fn axis(dead_zone: u16, orientation: Orientation) -> AxisConfig {
        AxisConfig {
            dead_zone,
            orientation,
            ..AxisConfig::default()
        }
    }

    #[test]
    fn physical_ends_map_to_full_scale() {
        let axis = AxisConfig::default();

        assert_eq!(axis.scale(-320), AXIS_MIN);
        assert_eq!(axis.scale(266), AXIS_MAX);
    }

    #[test]
    fn readings_outside_the_physical_range_are_clamped() {
        let axis = AxisConfig::default();

        assert_eq!(axis.scale(i16::MIN), AXIS_MIN);
        assert_eq!(axis.scale(-1000), AXIS_MIN);
        assert_eq!(axis.scale(1000), AXIS_MAX);
        assert_eq!(axis.scale(i16::MAX), AXIS_MAX);
    }

    #[test]
    fn inverted_orientation_swaps_the_ends() {
        let axis = axis(0, Orientation::Inverted);

        assert_eq!(axis.scale(-320), AXIS_MAX);
        assert_eq!(axis.scale(266), AXIS_MIN);
    }

    #[test]
    fn mapping_through_the_wire_is_monotonic() {
        for orientation in [Orientation::Normal, Orientation::Inverted] {
            let axes = AxesConfig {
                x: axis(0, orientation),
                y: axis(0, orientation),
            };
            let mapper = AxisMapper::new(axes);

            let mut previous: Option<i16> = None;
            for raw in -400..=400 {
                let decoded = ControllerFrame::decode(&frame(raw, 0, DPad::empty()).encode()).unwrap();
                let value = mapper.map(&decoded).x;

                if let Some(previous) = previous {
                    match orientation {
                        Orientation::Normal => assert!(value >= previous, "raw {raw}"),
                        Orientation::Inverted => assert!(value <= previous, "raw {raw}"),
                    }
                }
                previous = Some(value);
            }
        }
    }

    #[test]
    fn dead_zone_threshold_is_active() {
        let mapper = AxisMapper::new(AxesConfig::default());

        let at_threshold = mapper.map(&frame(22, -22, DPad::RIGHT | DPad::UP));
        assert_eq!(at_threshold.x_source, AxisSource::Stick);
        assert_eq!(at_threshold.y_source, AxisSource::Stick);
        assert_eq!(at_threshold.x, AxisConfig::default().scale(22));

        let inside = mapper.map(&frame(21, -21, DPad::RIGHT | DPad::UP));
        assert_eq!(inside.x_source, AxisSource::DPad);
        assert_eq!(inside.x, AXIS_MAX);
        assert_eq!(inside.y_source, AxisSource::DPad);
        assert_eq!(inside.y, AXIS_MIN);
    }

    #[test]
    fn stick_outside_dead_zone_ignores_dpad() {
        let mapper = AxisMapper::new(AxesConfig::default());

        let position = mapper.map(&frame(-320, 266, DPad::RIGHT | DPad::UP));
        assert_eq!(position.x, AXIS_MIN);
        assert_eq!(position.y, AXIS_MAX);
    }

    #[test]
    fn centered_stick_without_dpad_is_zero() {
        let mapper = AxisMapper::new(AxesConfig::default());

        let position = mapper.map(&frame(0, 5, DPad::empty()));
        assert_eq!((position.x, position.y), (0, 0));
    }

    #[test]
    fn opposing_dpad_bits_resolve_to_negative_direction() {
        let mapper = AxisMapper::new(AxesConfig::default());

        let position = mapper.map(&frame(0, 0, DPad::all()));
        assert_eq!(position.x, AXIS_MIN);
        assert_eq!(position.y, AXIS_MIN);
    }

    #[test]
    fn zero_dead_zone_always_uses_stick() {
        let axes = AxesConfig {
            x: axis(0, Orientation::Normal),
            y: axis(0, Orientation::Normal),
        };
        let mapper = AxisMapper::new(axes);

        let position = mapper.map(&frame(0, 0, DPad::LEFT));
        assert_eq!(position.x_source, AxisSource::Stick);
        assert_eq!(position.x, AxisConfig::default().scale(0));
    }

    #[test]
    fn axes_are_arbitrated_independently() {
        let mapper = AxisMapper::new(AxesConfig::default());

        let position = mapper.map(&frame(266, 3, DPad::DOWN | DPad::LEFT));
        assert_eq!(position.x_source, AxisSource::Stick);
        assert_eq!(position.x, AXIS_MAX);
        assert_eq!(position.y_source, AxisSource::DPad);
        assert_eq!(position.y, AXIS_MAX);
    }
}
