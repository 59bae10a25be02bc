//! Lenses and prisms over state and actions.
//!
//! - A [`Lens`] focuses on a slot that is always present in a larger value
//!   (a field of the state tree).
//! - A [`Prism`] focuses on one case of an enum that may or may not be present
//!   (a category of the top-level action).
//!
//! Both are plain pairs of `fn` pointers: they are `Copy`, can live in `const`
//! items, and never allocate beyond the wrapper they build.
//!
//! # Laws
//!
//! For every prism `p`, part `x` and whole `a`:
//!
//! - `p.extract(&p.embed(x)) == Some(&x)`
//! - if `p.extract(&a) == Some(y)` then `p.embed(y.clone()) == a`
//!
//! # Example
//!
//! ```
//! use rexlist_core::prism;
//! use rexlist_core::lens::Prism;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum Action {
//!     Counter(i32),
//!     Name(String),
//! }
//!
//! const COUNTER: Prism<Action, i32> = prism!(Action::Counter => i32);
//!
//! let action = COUNTER.embed(5);
//! assert_eq!(action, Action::Counter(5));
//! assert_eq!(COUNTER.extract(&action), Some(&5));
//! assert!(!COUNTER.is_case(&Action::Name("x".into())));
//! ```

/// Focus on a slot that always exists inside `Whole`
pub struct Lens<Whole, Part> {
    get: fn(&Whole) -> &Part,
    get_mut: fn(&mut Whole) -> &mut Part,
}

impl<Whole, Part> Lens<Whole, Part> {
    /// Build a lens from a shared and a mutable accessor
    #[must_use]
    pub const fn new(get: fn(&Whole) -> &Part, get_mut: fn(&mut Whole) -> &mut Part) -> Self {
        Self { get, get_mut }
    }

    /// Read the focused slot
    pub fn get<'a>(&self, whole: &'a Whole) -> &'a Part {
        (self.get)(whole)
    }

    /// Mutable access to the focused slot
    pub fn get_mut<'a>(&self, whole: &'a mut Whole) -> &'a mut Part {
        (self.get_mut)(whole)
    }

    /// Replace the focused slot
    pub fn set(&self, whole: &mut Whole, part: Part) {
        *(self.get_mut)(whole) = part;
    }

    /// The read accessor itself, for APIs that take a projection function
    #[must_use]
    pub const fn getter(&self) -> fn(&Whole) -> &Part {
        self.get
    }
}

impl<Whole, Part> Clone for Lens<Whole, Part> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Whole, Part> Copy for Lens<Whole, Part> {}

impl<Whole, Part> std::fmt::Debug for Lens<Whole, Part> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lens")
            .field("whole", &std::any::type_name::<Whole>())
            .field("part", &std::any::type_name::<Part>())
            .finish()
    }
}

/// The identity lens, focusing on the whole value
#[must_use]
pub const fn identity<T>() -> Lens<T, T> {
    fn get<T>(whole: &T) -> &T {
        whole
    }
    fn get_mut<T>(whole: &mut T) -> &mut T {
        whole
    }
    Lens::new(get::<T>, get_mut::<T>)
}

/// Focus on one case of an enum
pub struct Prism<Whole, Part> {
    extract: fn(&Whole) -> Option<&Part>,
    embed: fn(Part) -> Whole,
}

impl<Whole, Part> Prism<Whole, Part> {
    /// Build a prism from a matcher and a constructor
    ///
    /// Usually generated with [`prism!`](crate::prism).
    #[must_use]
    pub const fn new(extract: fn(&Whole) -> Option<&Part>, embed: fn(Part) -> Whole) -> Self {
        Self { extract, embed }
    }

    /// The payload, if `whole` is this case
    ///
    /// Absence is a normal outcome, never an error.
    pub fn extract<'a>(&self, whole: &'a Whole) -> Option<&'a Part> {
        (self.extract)(whole)
    }

    /// Wrap a payload back into the whole
    pub fn embed(&self, part: Part) -> Whole {
        (self.embed)(part)
    }

    /// Whether `whole` is this case
    pub fn is_case(&self, whole: &Whole) -> bool {
        (self.extract)(whole).is_some()
    }

    /// The embedding function itself, for APIs that take `fn(Part) -> Whole`
    #[must_use]
    pub const fn embedder(&self) -> fn(Part) -> Whole {
        self.embed
    }

    /// The matching function itself
    #[must_use]
    pub const fn extractor(&self) -> fn(&Whole) -> Option<&Part> {
        self.extract
    }
}

impl<Whole, Part> Clone for Prism<Whole, Part> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Whole, Part> Copy for Prism<Whole, Part> {}

impl<Whole, Part> std::fmt::Debug for Prism<Whole, Part> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prism")
            .field("whole", &std::any::type_name::<Whole>())
            .field("part", &std::any::type_name::<Part>())
            .finish()
    }
}

/// Declare a [`Prism`] for a single-field tuple variant
///
/// ```
/// use rexlist_core::{lens::Prism, prism};
///
/// #[derive(Debug, PartialEq)]
/// enum Msg {
///     Text(String),
///     Quit,
/// }
///
/// const TEXT: Prism<Msg, String> = prism!(Msg::Text => String);
/// assert_eq!(TEXT.extract(&Msg::Quit), None);
/// ```
#[macro_export]
macro_rules! prism {
    ($whole:ident :: $variant:ident => $part:ty) => {{
        fn extract(whole: &$whole) -> ::std::option::Option<&$part> {
            #[allow(unreachable_patterns)]
            match whole {
                $whole::$variant(part) => ::std::option::Option::Some(part),
                _ => ::std::option::Option::None,
            }
        }
        $crate::lens::Prism::<$whole, $part>::new(extract, $whole::$variant)
    }};
}

/// Declare a [`Lens`] for a named field
///
/// ```
/// use rexlist_core::{lens::Lens, lens_for};
///
/// struct Settings {
///     volume: u8,
/// }
///
/// const VOLUME: Lens<Settings, u8> = lens_for!(Settings.volume: u8);
/// let mut settings = Settings { volume: 3 };
/// VOLUME.set(&mut settings, 7);
/// assert_eq!(*VOLUME.get(&settings), 7);
/// ```
#[macro_export]
macro_rules! lens_for {
    ($whole:ident . $field:ident : $part:ty) => {{
        fn get(whole: &$whole) -> &$part {
            &whole.$field
        }
        fn get_mut(whole: &mut $whole) -> &mut $part {
            &mut whole.$field
        }
        $crate::lens::Lens::<$whole, $part>::new(get, get_mut)
    }};
}
