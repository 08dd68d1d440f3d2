//! Premium gating.
//!
//! Decides how much of a content item a viewer may see and which overlay to
//! show over the rest. Pure: a function of the viewer flags and the content
//! length only.

use serde::Serialize;

use crate::models::Profile;

/// What the viewer knows about their subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    /// Lookup still in flight. Gated like `Inactive`.
    #[default]
    Pending,
    Active,
    Inactive,
}

impl SubscriptionState {
    pub fn from_active(active: bool) -> Self {
        if active { Self::Active } else { Self::Inactive }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// The four inputs of the gating rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewer {
    pub authenticated: bool,
    pub admin: bool,
    pub subscription: SubscriptionState,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build from a profile. Suspended or disabled accounts are treated as
    /// anonymous: no admin bypass, no subscription, half of any content.
    pub fn from_profile(profile: &Profile, subscription: SubscriptionState) -> Self {
        if !profile.is_active() {
            return Self::anonymous();
        }
        Self {
            authenticated: true,
            admin: profile.is_active_admin(),
            subscription,
        }
    }
}

/// Price shown on the subscribe overlay, in whole currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Price {
    pub amount: i64,
    pub currency: String,
}

impl Price {
    pub fn ngn(amount: i64) -> Self {
        Self {
            amount,
            currency: "NGN".to_string(),
        }
    }

    /// `₦2500` for naira, `2500 USD` otherwise.
    pub fn label(&self) -> String {
        match self.currency.as_str() {
            "NGN" => format!("₦{}", self.amount),
            other => format!("{} {}", self.amount, other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlay {
    SignIn,
    Subscribe { price: Price },
}

impl Overlay {
    pub fn message(&self) -> String {
        match self {
            Overlay::SignIn => "Sign in to continue".to_string(),
            Overlay::Subscribe { price } => format!("Subscribe {}", price.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Open,
    AuthGated,
    SubscriptionGated,
}

/// Gate chosen for a viewer and content item, independent of length.
pub fn gate_for(viewer: &Viewer, content_is_premium: bool) -> Gate {
    if viewer.admin {
        Gate::Open
    } else if !viewer.authenticated {
        Gate::AuthGated
    } else if content_is_premium && !viewer.subscription.is_active() {
        Gate::SubscriptionGated
    } else {
        Gate::Open
    }
}

/// Units visible under a gate: all when open, otherwise the first half
/// rounded up.
pub fn visible_units(gate: Gate, total: usize) -> usize {
    match gate {
        Gate::Open => total,
        Gate::AuthGated | Gate::SubscriptionGated => total.div_ceil(2),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub gate: Gate,
    pub visible: usize,
    pub overlay: Option<Overlay>,
}

/// Evaluate one content representation of `total` units.
///
/// Zero-unit content has nothing to gate: zero visible, no overlay.
pub fn evaluate(viewer: &Viewer, content_is_premium: bool, total: usize, price: &Price) -> Decision {
    let gate = gate_for(viewer, content_is_premium);
    let overlay = if total == 0 {
        None
    } else {
        match gate {
            Gate::Open => None,
            Gate::AuthGated => Some(Overlay::SignIn),
            Gate::SubscriptionGated => Some(Overlay::Subscribe {
                price: price.clone(),
            }),
        }
    };

    Decision {
        gate,
        visible: visible_units(gate, total),
        overlay,
    }
}

/// Split `items` into the visible prefix and the gated rest.
pub fn reveal<'a, T>(items: &'a [T], decision: &Decision) -> (&'a [T], &'a [T]) {
    items.split_at(decision.visible.min(items.len()))
}
