//! Generic keyframe sampling shared by storyboards and input scripts.
use crate::easing::Easing;

pub trait Timed {
    fn time(&self) -> f32;
}

pub trait Lerp: Sized {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

impl<const N: usize> Lerp for [f32; N] {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        std::array::from_fn(|i| f32::lerp(&a[i], &b[i], t))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anchor<V> {
    pub time: f32,
    pub value: V,
}

/// `prev` is the last keyframe with `time <= at`, `next` the first after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Span<V> {
    pub at: f32,
    pub prev: Option<Anchor<V>>,
    pub next: Option<Anchor<V>>,
}

pub trait Policy<V> {
    fn pick(&self, span: Span<V>, easing: Easing) -> Option<V>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Continuous;

#[derive(Debug, Clone, Copy, Default)]
pub struct Hold;

#[derive(Debug, Clone, Copy, Default)]
pub struct Nearest;

impl<V: Lerp> Policy<V> for Continuous {
    fn pick(&self, span: Span<V>, easing: Easing) -> Option<V> {
        match (span.prev, span.next) {
            (None, next) => next.map(|anchor| anchor.value),
            (Some(prev), None) => Some(prev.value),
            (Some(prev), Some(next)) => {
                let gap = next.time - prev.time;
                let fraction = if gap <= 0.0 {
                    1.0
                } else {
                    ((span.at - prev.time) / gap).clamp(0.0, 1.0)
                };
                let eased = easing.apply(fraction);
                // Exact endpoints avoid float drift at keyframe times.
                if eased <= 0.0 {
                    Some(prev.value)
                } else if eased >= 1.0 {
                    Some(next.value)
                } else {
                    Some(V::lerp(&prev.value, &next.value, eased))
                }
            }
        }
    }
}

impl<V> Policy<V> for Hold {
    fn pick(&self, span: Span<V>, _easing: Easing) -> Option<V> {
        // Before the first keyframe there is no prev; the first value holds.
        span.prev.or(span.next).map(|anchor| anchor.value)
    }
}

impl<V> Policy<V> for Nearest {
    fn pick(&self, span: Span<V>, _easing: Easing) -> Option<V> {
        match (span.prev, span.next) {
            (Some(prev), Some(next)) => {
                if span.at - prev.time <= next.time - span.at {
                    Some(prev.value)
                } else {
                    Some(next.value)
                }
            }
            (prev, next) => prev.or(next).map(|anchor| anchor.value),
        }
    }
}

/// Keyframes sorted by time plus the easing used between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline<K> {
    keyframes: Vec<K>,
    easing: Easing,
}

impl<K> Default for Timeline<K> {
    fn default() -> Self {
        Self {
            keyframes: Vec::new(),
            easing: Easing::default(),
        }
    }
}

impl<K: Timed> Timeline<K> {
    /// Sorts `keyframes` by time. The sort is stable, so keyframes sharing a
    /// time keep their authored order and the last of them wins.
    pub fn new(mut keyframes: Vec<K>, easing: Easing) -> Self {
        keyframes.sort_by(|a, b| a.time().total_cmp(&b.time()));
        Self { keyframes, easing }
    }

    pub fn keyframes(&self) -> &[K] {
        &self.keyframes
    }

    pub fn into_keyframes(self) -> Vec<K> {
        self.keyframes
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    pub fn set_easing(&mut self, easing: Easing) {
        self.easing = easing;
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn insert(&mut self, keyframe: K) {
        let index = self
            .keyframes
            .partition_point(|existing| existing.time() <= keyframe.time());
        self.keyframes.insert(index, keyframe);
    }

    pub fn duration(&self) -> f32 {
        self.keyframes.last().map_or(0.0, |last| last.time().max(0.0))
    }

    pub fn span<'a, V>(&'a self, at: f32, field: impl Fn(&'a K) -> V) -> Option<Span<V>> {
        if self.keyframes.is_empty() {
            return None;
        }
        let index = self.keyframes.partition_point(|keyframe| keyframe.time() <= at);
        let anchor = |keyframe: &'a K| Anchor {
            time: keyframe.time(),
            value: field(keyframe),
        };
        Some(Span {
            at,
            prev: index
                .checked_sub(1)
                .and_then(|prev| self.keyframes.get(prev))
                .map(&anchor),
            next: self.keyframes.get(index).map(&anchor),
        })
    }

    pub fn sample<'a, V, P: Policy<V>>(
        &'a self,
        at: f32,
        policy: P,
        field: impl Fn(&'a K) -> V,
    ) -> Option<V> {
        policy.pick(self.span(at, field)?, self.easing)
    }
}

/// Picks the first present tier, most specific first, else `fallback`.
pub fn resolve<V>(tiers: impl IntoIterator<Item = Option<V>>, fallback: V) -> V {
    tiers.into_iter().flatten().next().unwrap_or(fallback)
}

/// Number of frames covering `[0, duration]` inclusive at `fps`; at least one.
pub fn frame_count(duration: f32, fps: u32) -> u32 {
    if fps == 0 || !duration.is_finite() || duration <= 0.0 {
        return 1;
    }
    // Absorbs f32 noise such as 0.7 s * 30 fps landing just under 21.
    let exact = f64::from(duration) * f64::from(fps);
    (exact + 1e-4).floor() as u32 + 1
}

pub fn frame_times(duration: f32, fps: u32) -> Vec<f32> {
    let step = f64::from(fps.max(1));
    (0..frame_count(duration, fps))
        .map(|frame| (f64::from(frame) / step) as f32)
        .collect()
}
