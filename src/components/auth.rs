use std::rc::Rc;

use dioxus::prelude::*;
use futures::StreamExt;

use super::common::LoadingSpinner;
use crate::context::AuthContext;
use crate::state::AuthState;

/// Mounts `context` for its subtree.
///
/// On mount it attaches cross-tab sync and the provider event listener,
/// runs bootstrap, and mirrors every state change into a
/// `Signal<AuthState>`. Unmounting drops all of them, which unsubscribes.
#[component]
pub fn AuthProvider(context: AuthContext, children: Element) -> Element {
    let ctx = use_context_provider(|| context.clone());
    let mut state = use_context_provider(|| Signal::new(ctx.snapshot()));
    use_hook(|| Rc::new(ctx.attach_cross_tab()));

    use_future(move || {
        let ctx = ctx.clone();
        async move {
            let mut changes = ctx.store().changes();
            state.set(ctx.snapshot());

            let listener = ctx.attach_listener();
            let mirror = async move {
                while let Some(next) = changes.next().await {
                    state.set(next);
                }
            };
            futures::join!(ctx.bootstrap(), listener.run(), mirror);
        }
    });

    rsx! { {children} }
}

/// Route guard: placeholder until bootstrap finishes, then `children`
/// for a signed-in user and `fallback` otherwise.
#[component]
pub fn RequireAuth(children: Element, fallback: Element) -> Element {
    let state = use_auth_state();
    let state = state.read();

    if !state.is_initialized {
        return rsx! { LoadingSpinner {} };
    }
    if state.is_authenticated {
        rsx! { {children} }
    } else {
        rsx! { {fallback} }
    }
}

pub fn use_auth() -> AuthContext {
    use_context::<AuthContext>()
}

pub fn use_auth_state() -> Signal<AuthState> {
    use_context::<Signal<AuthState>>()
}

/// Remote sign-out, then local logout whatever the remote says
pub fn use_sign_out() -> Callback<()> {
    let ctx = use_auth();
    use_callback(move |_: ()| {
        let ctx = ctx.clone();
        spawn(async move {
            ctx.sign_out().await;
        });
    })
}
