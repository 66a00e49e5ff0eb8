//! Decorative emojis bobbing behind the panels.

use rand::Rng;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{
        Color,
        Style,
    },
    widgets::Widget,
};
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

pub const EMOJIS: [&str; 6] = ["🎉", "🍀", "🎲", "💰", "🎰", "🧨"];
pub const FLOATER_COUNT: usize = 100;

/// Rows travelled above and below the resting position.
const AMPLITUDE: f32 = 1.0;

#[derive(Clone, Debug)]
pub struct Floater {
    pub emoji: &'static str,
    /// Resting position as a fraction of the area, `0.0..1.0`.
    pub left: f32,
    pub top: f32,
    pub period: Duration,
    pub delay: Duration,
}

impl Floater {
    /// Vertical offset in rows at `elapsed`.
    fn offset(&self, elapsed: Duration) -> i32 {
        let Some(running) = elapsed.checked_sub(self.delay) else {
            return 0;
        };
        let phase = running.as_secs_f32() / self.period.as_secs_f32();
        (AMPLITUDE * (phase * std::f32::consts::TAU).sin()).round() as i32
    }
}

#[derive(Clone, Debug, Default)]
pub struct FloaterField {
    floaters: Vec<Floater>,
    elapsed: Duration,
}

impl FloaterField {
    pub fn new(count: usize, rng: &mut impl Rng) -> Self {
        let floaters = (0..count)
            .map(|i| Floater {
                emoji: EMOJIS[i % EMOJIS.len()],
                left: rng.random_range(0.0..1.0),
                top: rng.random_range(0.0..1.0),
                period: Duration::from_secs_f32(rng.random_range(8.0..20.0)),
                delay: Duration::from_secs_f32(rng.random_range(0.0..10.0)),
            })
            .collect();
        Self {
            floaters,
            elapsed: Duration::ZERO,
        }
    }

    pub fn random() -> Self {
        Self::new(FLOATER_COUNT, &mut rand::rng())
    }

    pub fn tick(&mut self, delta: Duration) {
        self.elapsed += delta;
    }

    pub fn floaters(&self) -> &[Floater] {
        &self.floaters
    }

    /// Cell each floater occupies in `area` right now. Floaters that would
    /// not fit are left out.
    pub fn placements(&self, area: Rect) -> Vec<(u16, u16, &'static str)> {
        if area.width == 0 || area.height == 0 {
            return Vec::new();
        }
        self.floaters
            .iter()
            .filter_map(|floater| {
                let width = floater.emoji.width() as u16;
                if width > area.width {
                    return None;
                }
                let x = area.x + (floater.left * f32::from(area.width - width)) as u16;
                let rest = (floater.top * f32::from(area.height - 1)) as i32;
                let y = (rest + floater.offset(self.elapsed))
                    .clamp(0, i32::from(area.height) - 1) as u16;
                Some((x, area.y + y, floater.emoji))
            })
            .collect()
    }
}

impl Widget for &FloaterField {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default().fg(Color::DarkGray);
        for (x, y, emoji) in self.placements(area) {
            buf.set_stringn(x, y, emoji, usize::from(area.right() - x), style);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    #[test]
    fn new__cycles_through_emojis_with_bounded_timing() {
        let mut rng = StdRng::seed_from_u64(7);

        let field = FloaterField::new(FLOATER_COUNT, &mut rng);

        assert_eq!(FLOATER_COUNT, field.floaters().len());
        for (i, floater) in field.floaters().iter().enumerate() {
            assert_eq!(EMOJIS[i % EMOJIS.len()], floater.emoji);
            assert!((8.0..20.0).contains(&floater.period.as_secs_f32()));
            assert!(floater.delay < Duration::from_secs(10));
        }
    }

    #[test]
    fn placements__stay_inside_area_while_animating() {
        // given
        let mut rng = StdRng::seed_from_u64(42);
        let mut field = FloaterField::new(FLOATER_COUNT, &mut rng);
        let area = Rect::new(3, 2, 40, 10);

        for _ in 0..50 {
            // when
            field.tick(Duration::from_millis(700));

            // then
            for (x, y, emoji) in field.placements(area) {
                assert!(x >= area.x && x + emoji.width() as u16 <= area.right());
                assert!(y >= area.y && y < area.bottom());
            }
        }
    }

    #[test]
    fn placements__area_too_narrow__is_empty() {
        let field = FloaterField::new(10, &mut StdRng::seed_from_u64(1));

        assert!(field.placements(Rect::new(0, 0, 1, 5)).is_empty());
        assert!(field.placements(Rect::new(0, 0, 0, 0)).is_empty());
    }

    #[test]
    fn offset__before_delay__is_zero() {
        let floater = Floater {
            emoji: EMOJIS[0],
            left: 0.5,
            top: 0.5,
            period: Duration::from_secs(8),
            delay: Duration::from_secs(5),
        };

        assert_eq!(0, floater.offset(Duration::from_secs(3)));
        assert_eq!(1, floater.offset(Duration::from_secs(7)));
    }
}
