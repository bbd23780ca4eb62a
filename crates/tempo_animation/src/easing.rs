//! Easing functions and the easing registry
//!
//! Every built-in family is authored once as its "in" curve (or its "out"
//! curve for elastic and bounce) and the other directions are derived
//! mechanically:
//!
//! - out: `1 - in(1 - p)`
//! - in-out: `in(2p) / 2` below one half, `1 - in(2(1 - p)) / 2` above
//!
//! Overshooting curves (back, elastic) are never clamped.

use std::f64::consts::{FRAC_PI_2, TAU};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::error::AnimationError;

/// Default overshoot for the back family
pub const BACK_OVERSHOOT: f64 = 1.70158;

/// Which end of the curve is eased
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EaseDirection {
    In,
    #[default]
    Out,
    InOut,
}

impl EaseDirection {
    fn suffix(self) -> &'static str {
        match self {
            EaseDirection::In => "in",
            EaseDirection::Out => "out",
            EaseDirection::InOut => "inOut",
        }
    }
}

/// Built-in easing curves
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Easing {
    #[default]
    Linear,
    /// `p^(n + 1)`; power1 is quad, power4 is quint
    Power(u8, EaseDirection),
    Sine(EaseDirection),
    Circ(EaseDirection),
    Expo(EaseDirection),
    Back {
        overshoot: f64,
        direction: EaseDirection,
    },
    Elastic {
        amplitude: f64,
        period: f64,
        direction: EaseDirection,
    },
    Bounce(EaseDirection),
    /// Jumps in `n` equal steps, reaching 1 at the end
    Steps(u32),
    CubicBezier(f64, f64, f64, f64),
}

impl Easing {
    pub fn back(direction: EaseDirection) -> Self {
        Easing::Back {
            overshoot: BACK_OVERSHOOT,
            direction,
        }
    }

    pub fn elastic(direction: EaseDirection) -> Self {
        Easing::Elastic {
            amplitude: 1.0,
            period: default_elastic_period(direction),
            direction,
        }
    }

    /// Apply the easing function to a progress value
    pub fn apply(&self, p: f64) -> f64 {
        match *self {
            Easing::Linear => p,
            Easing::Power(n, direction) => {
                let exponent = n as i32 + 1;
                directed(direction, p, |p| p.powi(exponent))
            }
            Easing::Sine(direction) => directed(direction, p, sine_in),
            Easing::Circ(direction) => directed(direction, p, circ_in),
            Easing::Expo(direction) => directed(direction, p, expo_in),
            Easing::Back {
                overshoot,
                direction,
            } => directed(direction, p, |p| p * p * ((overshoot + 1.0) * p - overshoot)),
            Easing::Elastic {
                amplitude,
                period,
                direction,
            } => {
                let curve = ElasticCurve::new(amplitude, period);
                directed_from_out(direction, p, |p| curve.out(p))
            }
            Easing::Bounce(direction) => directed_from_out(direction, p, bounce_out),
            Easing::Steps(steps) => {
                let steps = steps.max(1) as f64;
                if p >= 1.0 {
                    1.0
                } else {
                    (p.max(0.0) * steps).floor() / steps
                }
            }
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier_ease(p, x1, y1, x2, y2),
        }
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Easing::Linear => f.write_str("linear"),
            Easing::Power(n, d) => write!(f, "power{}.{}", n, d.suffix()),
            Easing::Sine(d) => write!(f, "sine.{}", d.suffix()),
            Easing::Circ(d) => write!(f, "circ.{}", d.suffix()),
            Easing::Expo(d) => write!(f, "expo.{}", d.suffix()),
            Easing::Back {
                overshoot,
                direction,
            } => write!(f, "back.{}({})", direction.suffix(), overshoot),
            Easing::Elastic {
                amplitude,
                period,
                direction,
            } => write!(f, "elastic.{}({},{})", direction.suffix(), amplitude, period),
            Easing::Bounce(d) => write!(f, "bounce.{}", d.suffix()),
            Easing::Steps(n) => write!(f, "steps({})", n),
            Easing::CubicBezier(x1, y1, x2, y2) => {
                write!(f, "cubicBezier({},{},{},{})", x1, y1, x2, y2)
            }
        }
    }
}

impl FromStr for Easing {
    type Err = AnimationError;

    /// Parse a case-insensitive ease name such as `"power2.inOut"`,
    /// `"back.out(2.5)"` or `"cubicBezier(0.42, 0, 0.58, 1)"`
    ///
    /// A bare family name means its "out" direction.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AnimationError::InvalidEase(s.to_string());
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        let (head, args) = match normalized.find('(') {
            Some(open) => {
                let inner = normalized[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(invalid)?;
                let args = if inner.is_empty() {
                    Vec::new()
                } else {
                    inner
                        .split(',')
                        .map(|a| a.parse::<f64>().map_err(|_| invalid()))
                        .collect::<Result<Vec<_>, _>>()?
                };
                (&normalized[..open], args)
            }
            None => (normalized.as_str(), Vec::new()),
        };

        let (family, direction) = match head.rsplit_once('.') {
            Some((family, "in")) => (family, EaseDirection::In),
            Some((family, "out")) => (family, EaseDirection::Out),
            Some((family, "inout")) => (family, EaseDirection::InOut),
            Some(_) => return Err(invalid()),
            None => (head, EaseDirection::Out),
        };
        let arg = |i: usize| args.get(i).copied();

        let easing = match family {
            "linear" | "none" => Easing::Linear,
            "power0" => Easing::Power(0, direction),
            "power1" | "quad" => Easing::Power(1, direction),
            "power2" | "cubic" => Easing::Power(2, direction),
            "power3" | "quart" => Easing::Power(3, direction),
            "power4" | "quint" | "strong" => Easing::Power(4, direction),
            "sine" => Easing::Sine(direction),
            "circ" => Easing::Circ(direction),
            "expo" => Easing::Expo(direction),
            "bounce" => Easing::Bounce(direction),
            "back" => Easing::Back {
                overshoot: arg(0).unwrap_or(BACK_OVERSHOOT),
                direction,
            },
            "elastic" => Easing::Elastic {
                amplitude: arg(0).unwrap_or(1.0),
                period: arg(1).unwrap_or_else(|| default_elastic_period(direction)),
                direction,
            },
            "steps" => Easing::Steps(arg(0).map(|n| n.max(1.0) as u32).unwrap_or(1)),
            "cubicbezier" => match args.as_slice() {
                [x1, y1, x2, y2] => Easing::CubicBezier(*x1, *y1, *x2, *y2),
                _ => return Err(invalid()),
            },
            _ => return Err(invalid()),
        };
        Ok(easing)
    }
}

fn default_elastic_period(direction: EaseDirection) -> f64 {
    match direction {
        EaseDirection::InOut => 0.45,
        _ => 0.3,
    }
}

fn sine_in(p: f64) -> f64 {
    if p == 1.0 {
        1.0
    } else {
        1.0 - (p * FRAC_PI_2).cos()
    }
}

fn circ_in(p: f64) -> f64 {
    -((1.0 - p * p).sqrt() - 1.0)
}

fn expo_in(p: f64) -> f64 {
    if p == 0.0 {
        0.0
    } else {
        2f64.powf(10.0 * (p - 1.0))
    }
}

fn bounce_out(p: f64) -> f64 {
    const N1: f64 = 7.5625;
    const N2: f64 = 2.75;
    if p < 1.0 / N2 {
        N1 * p * p
    } else if p < 2.0 / N2 {
        let p = p - 1.5 / N2;
        N1 * p * p + 0.75
    } else if p < 2.5 / N2 {
        let p = p - 2.25 / N2;
        N1 * p * p + 0.9375
    } else {
        let p = p - 2.625 / N2;
        N1 * p * p + 0.984375
    }
}

struct ElasticCurve {
    amplitude: f64,
    frequency: f64,
    phase: f64,
}

impl ElasticCurve {
    fn new(amplitude: f64, period: f64) -> Self {
        let amplitude_clamped = amplitude.max(1.0);
        let period = if period > 0.0 { period } else { 0.3 };
        let period = period / amplitude.min(1.0).max(f64::EPSILON);
        let phase = period / TAU * (1.0 / amplitude_clamped).asin();
        Self {
            amplitude: amplitude_clamped,
            frequency: TAU / period,
            phase,
        }
    }

    fn out(&self, p: f64) -> f64 {
        if p == 1.0 {
            return 1.0;
        }
        self.amplitude * 2f64.powf(-10.0 * p) * ((p - self.phase) * self.frequency).sin() + 1.0
    }
}

#[inline]
fn directed(direction: EaseDirection, p: f64, ease_in: impl Fn(f64) -> f64) -> f64 {
    match direction {
        EaseDirection::In => ease_in(p),
        EaseDirection::Out => out_from_in(&ease_in, p),
        EaseDirection::InOut => in_out_from_in(&ease_in, p),
    }
}

#[inline]
fn directed_from_out(direction: EaseDirection, p: f64, ease_out: impl Fn(f64) -> f64) -> f64 {
    // in(p) = 1 - out(1 - p), the same mirror both ways
    let ease_in = |p: f64| 1.0 - ease_out(1.0 - p);
    directed(direction, p, ease_in)
}

#[inline]
fn out_from_in(ease_in: &impl Fn(f64) -> f64, p: f64) -> f64 {
    1.0 - ease_in(1.0 - p)
}

#[inline]
fn in_out_from_in(ease_in: &impl Fn(f64) -> f64, p: f64) -> f64 {
    if p < 0.5 {
        ease_in(p * 2.0) / 2.0
    } else {
        1.0 - ease_in((1.0 - p) * 2.0) / 2.0
    }
}

/// Cubic bezier easing calculation (matches CSS spec / browser implementations).
///
/// Uses Newton-Raphson with binary-search fallback for robustness.
fn cubic_bezier_ease(t: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    // Endpoints are always exact
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }

    let x = t;

    // Solve for parameter `p` where bezier_x(p) == x using Newton-Raphson,
    // falling back to binary search if the slope is too flat.
    let mut p = x;
    for _ in 0..8 {
        let err = bezier_sample(p, x1, x2) - x;
        if err.abs() < 1e-9 {
            return bezier_sample(p, y1, y2);
        }
        let slope = bezier_slope(p, x1, x2);
        if slope.abs() < 1e-9 {
            break;
        }
        p -= err / slope;
    }

    // Binary search fallback (always converges)
    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    p = x;
    for _ in 0..40 {
        let val = bezier_sample(p, x1, x2);
        if (val - x).abs() < 1e-9 {
            break;
        }
        if val < x {
            lo = p;
        } else {
            hi = p;
        }
        p = (lo + hi) * 0.5;
    }

    bezier_sample(p, y1, y2)
}

/// Evaluate cubic bezier at parameter t: B(t) = 3(1-t)²t·p1 + 3(1-t)t²·p2 + t³
#[inline]
fn bezier_sample(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    ((a * t + b) * t + c) * t
}

/// Derivative of cubic bezier
#[inline]
fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    (3.0 * a * t + 2.0 * b) * t + c
}

/// A named, shareable easing function
#[derive(Clone)]
pub struct Ease {
    name: Rc<str>,
    func: Rc<dyn Fn(f64) -> f64>,
}

impl Ease {
    pub fn new(name: &str, func: impl Fn(f64) -> f64 + 'static) -> Self {
        Self {
            name: Rc::from(name),
            func: Rc::new(func),
        }
    }

    /// An unnamed ease supplied directly as a function
    pub fn custom(func: impl Fn(f64) -> f64 + 'static) -> Self {
        Self::new("custom", func)
    }

    pub fn linear() -> Self {
        Easing::Linear.into()
    }

    #[inline]
    pub fn apply(&self, p: f64) -> f64 {
        (self.func)(p)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Treat `self` as an "in" curve and derive its "out" counterpart
    pub fn derive_out(&self) -> Ease {
        let ease_in = self.func.clone();
        Ease::new(&format!("{}.out", self.name), move |p| {
            out_from_in(&|x| ease_in(x), p)
        })
    }

    /// Treat `self` as an "in" curve and derive its "in-out" counterpart
    pub fn derive_in_out(&self) -> Ease {
        let ease_in = self.func.clone();
        Ease::new(&format!("{}.inOut", self.name), move |p| {
            in_out_from_in(&|x| ease_in(x), p)
        })
    }

    /// Mirror used on the backward half of a yoyo cycle
    pub fn derive_yoyo_inverse(&self) -> Ease {
        let ease = self.func.clone();
        Ease::new(&format!("{}.yoyo", self.name), move |p| 1.0 - ease(1.0 - p))
    }
}

impl From<Easing> for Ease {
    fn from(easing: Easing) -> Self {
        Ease::new(&easing.to_string(), move |p| easing.apply(p))
    }
}

impl fmt::Debug for Ease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ease").field(&self.name).finish()
    }
}

impl Default for Ease {
    fn default() -> Self {
        Ease::linear()
    }
}

/// How a caller names an ease: by registry name or by value
#[derive(Clone, Debug)]
pub enum EaseSpec {
    Named(String),
    Ease(Ease),
}

impl From<&str> for EaseSpec {
    fn from(name: &str) -> Self {
        EaseSpec::Named(name.to_string())
    }
}

impl From<String> for EaseSpec {
    fn from(name: String) -> Self {
        EaseSpec::Named(name)
    }
}

impl From<Ease> for EaseSpec {
    fn from(ease: Ease) -> Self {
        EaseSpec::Ease(ease)
    }
}

impl From<Easing> for EaseSpec {
    fn from(easing: Easing) -> Self {
        EaseSpec::Ease(easing.into())
    }
}

/// Name to ease lookup
///
/// Custom registrations shadow the built-in families. Lookup is
/// case-insensitive.
#[derive(Default)]
pub struct EaseRegistry {
    custom: FxHashMap<String, Ease>,
}

impl EaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single named ease
    pub fn register(&mut self, name: &str, func: impl Fn(f64) -> f64 + 'static) -> Ease {
        let ease = Ease::new(name, func);
        self.custom.insert(name.to_ascii_lowercase(), ease.clone());
        ease
    }

    /// Register a family from its "in" curve
    ///
    /// Adds `name.in`, `name.out`, `name.inOut` and the bare `name`, which
    /// means "out".
    pub fn register_family(&mut self, name: &str, ease_in: impl Fn(f64) -> f64 + 'static) {
        let base = Ease::new(&format!("{}.in", name), ease_in);
        let out = base.derive_out();
        let in_out = base.derive_in_out();
        let key = name.to_ascii_lowercase();

        self.custom.insert(format!("{}.in", key), base);
        self.custom.insert(format!("{}.inout", key), in_out);
        self.custom.insert(format!("{}.out", key), out.clone());
        self.custom.insert(key, out);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// Strict lookup, used when validating configuration
    pub fn lookup(&self, name: &str) -> Result<Ease, AnimationError> {
        if let Some(ease) = self.custom.get(&name.trim().to_ascii_lowercase()) {
            return Ok(ease.clone());
        }
        name.parse::<Easing>().map(Ease::from)
    }

    /// Resolve a name or pass a function value through
    ///
    /// Unknown names fall back to linear with a warning.
    pub fn resolve(&self, spec: &EaseSpec) -> Ease {
        match spec {
            EaseSpec::Ease(ease) => ease.clone(),
            EaseSpec::Named(name) => self.lookup(name).unwrap_or_else(|_| {
                warn!("unknown ease '{}', falling back to linear", name);
                Ease::linear()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const EPSILON: f64 = 1e-9;

    fn samples() -> impl Iterator<Item = f64> {
        (1..100).map(|i| i as f64 / 100.0)
    }

    #[test]
    fn test_endpoints() {
        let names = [
            "linear", "power1", "power4.in", "sine.inOut", "circ.out", "expo.in", "back.out",
            "elastic.out", "bounce.inOut", "steps(4)",
        ];
        let registry = EaseRegistry::new();
        for name in names {
            let ease = registry.lookup(name).unwrap();
            assert!(ease.apply(0.0).abs() < EPSILON, "{} at 0", name);
            assert!((ease.apply(1.0) - 1.0).abs() < EPSILON, "{} at 1", name);
        }
    }

    #[test]
    fn test_in_out_matches_closed_forms() {
        let quad = |p: f64| {
            if p < 0.5 {
                2.0 * p * p
            } else {
                1.0 - (-2.0 * p + 2.0).powi(2) / 2.0
            }
        };
        let quint = |p: f64| {
            if p < 0.5 {
                16.0 * p.powi(5)
            } else {
                1.0 - (-2.0 * p + 2.0).powi(5) / 2.0
            }
        };
        let sine = |p: f64| -((PI * p).cos() - 1.0) / 2.0;
        let circ = |p: f64| {
            if p < 0.5 {
                (1.0 - (1.0 - (2.0 * p).powi(2)).sqrt()) / 2.0
            } else {
                ((1.0 - (-2.0 * p + 2.0).powi(2)).sqrt() + 1.0) / 2.0
            }
        };
        let expo = |p: f64| {
            if p < 0.5 {
                2f64.powf(20.0 * p - 10.0) / 2.0
            } else {
                (2.0 - 2f64.powf(-20.0 * p + 10.0)) / 2.0
            }
        };

        for p in samples() {
            assert!((Easing::Power(1, EaseDirection::InOut).apply(p) - quad(p)).abs() < EPSILON);
            assert!((Easing::Power(4, EaseDirection::InOut).apply(p) - quint(p)).abs() < EPSILON);
            assert!((Easing::Sine(EaseDirection::InOut).apply(p) - sine(p)).abs() < EPSILON);
            assert!((Easing::Circ(EaseDirection::InOut).apply(p) - circ(p)).abs() < EPSILON);
            assert!((Easing::Expo(EaseDirection::InOut).apply(p) - expo(p)).abs() < EPSILON);
        }
    }

    #[test]
    fn test_derivations_from_ease_value() {
        let cubic_in = Ease::new("mycubic", |p| p * p * p);
        let out = cubic_in.derive_out();
        let in_out = cubic_in.derive_in_out();
        let yoyo = cubic_in.derive_yoyo_inverse();

        for p in samples() {
            assert!((out.apply(p) - (1.0 - (1.0 - p).powi(3))).abs() < EPSILON);
            let expected = if p < 0.5 {
                cubic_in.apply(2.0 * p) / 2.0
            } else {
                1.0 - cubic_in.apply(2.0 * (1.0 - p)) / 2.0
            };
            assert_eq!(in_out.apply(p), expected);
            assert_eq!(yoyo.apply(p), out.apply(p));
        }
        assert_eq!(in_out.name(), "mycubic.inOut");
    }

    #[test]
    fn test_overshoot_is_preserved() {
        let back = Easing::back(EaseDirection::Out);
        let peak = samples().map(|p| back.apply(p)).fold(f64::MIN, f64::max);
        assert!(peak > 1.0);

        let elastic = Easing::elastic(EaseDirection::Out);
        assert!(samples().any(|p| elastic.apply(p) > 1.0));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            "Power2.InOut".parse::<Easing>().unwrap(),
            Easing::Power(2, EaseDirection::InOut)
        );
        assert_eq!(
            "quad".parse::<Easing>().unwrap(),
            Easing::Power(1, EaseDirection::Out)
        );
        assert_eq!(
            "back.in(3)".parse::<Easing>().unwrap(),
            Easing::Back {
                overshoot: 3.0,
                direction: EaseDirection::In
            }
        );
        assert_eq!(
            "cubicBezier(0.42, 0, 0.58, 1)".parse::<Easing>().unwrap(),
            Easing::CubicBezier(0.42, 0.0, 0.58, 1.0)
        );
        assert!("wobble".parse::<Easing>().is_err());
        assert!("power2.sideways".parse::<Easing>().is_err());
        assert!("cubicBezier(1,2)".parse::<Easing>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for easing in [
            Easing::Power(3, EaseDirection::In),
            Easing::elastic(EaseDirection::InOut),
            Easing::Steps(5),
            Easing::CubicBezier(0.25, 0.1, 0.25, 1.0),
        ] {
            assert_eq!(easing.to_string().parse::<Easing>().unwrap(), easing);
        }
    }

    #[test]
    fn test_steps() {
        let steps = Easing::Steps(4);
        assert_eq!(steps.apply(0.1), 0.0);
        assert_eq!(steps.apply(0.26), 0.25);
        assert_eq!(steps.apply(0.99), 0.75);
        assert_eq!(steps.apply(1.0), 1.0);
    }

    #[test]
    fn test_cubic_bezier_linear_control_points() {
        let ease = Easing::CubicBezier(0.25, 0.25, 0.75, 0.75);
        for p in samples() {
            assert!((ease.apply(p) - p).abs() < 1e-6);
        }
    }

    #[test]
    fn test_registry_custom_and_fallback() {
        let mut registry = EaseRegistry::new();
        registry.register_family("square", |p| p * p);

        assert_eq!(registry.resolve(&"SQUARE.in".into()).apply(0.5), 0.25);
        assert_eq!(registry.resolve(&"square".into()).apply(0.5), 0.75);

        let unknown = registry.resolve(&"nope".into());
        assert_eq!(unknown.apply(0.3), 0.3);
        assert_eq!(unknown.name(), "linear");

        let direct = registry.resolve(&Ease::custom(|p| p * 0.5).into());
        assert_eq!(direct.apply(1.0), 0.5);
    }
}
