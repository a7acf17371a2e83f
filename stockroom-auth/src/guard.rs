//! Route guards
//!
//! Two gates in front of a page: the authentication guard (is anyone signed
//! in, and are their permissions loaded) and the permission guard (does the
//! signed-in user hold one of the required keys).

use crate::context::AuthContext;
use tracing::debug;

/// What the router should do with the guarded subtree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Still resolving; render nothing
    Pending,
    Render,
    Redirect {
        to: String,
        /// Path the visitor tried to reach, for returning after sign-in
        from: Option<String>,
    },
}

impl GuardOutcome {
    pub fn is_render(&self) -> bool {
        matches!(self, GuardOutcome::Render)
    }
}

/// Redirect targets used by the guards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPaths {
    pub sign_in: String,
    pub home: String,
}

impl Default for GuardPaths {
    fn default() -> Self {
        Self {
            sign_in: "/sign-in".to_string(),
            home: "/".to_string(),
        }
    }
}

pub struct AuthGuard<'a> {
    ctx: &'a AuthContext,
}

impl<'a> AuthGuard<'a> {
    pub fn new(ctx: &'a AuthContext) -> Self {
        Self { ctx }
    }

    /// Decide without waiting
    pub fn evaluate(&self, path: &str) -> GuardOutcome {
        if !self.ctx.state().is_authenticated() {
            return self.to_sign_in(path);
        }

        if self.ctx.is_ready() {
            GuardOutcome::Render
        } else {
            GuardOutcome::Pending
        }
    }

    /// Decide, loading permissions first if needed
    ///
    /// A failed load still renders: the permission guards below stay closed
    /// until a later load succeeds. A 401 ends the session and redirects.
    pub async fn resolve(&self, path: &str) -> GuardOutcome {
        match self.evaluate(path) {
            GuardOutcome::Pending => {}
            decided => return decided,
        }

        if let Err(e) = self.ctx.refresh().await {
            debug!("Guard for {} continues after failed refresh: {}", path, e);
            if !self.ctx.state().is_authenticated() {
                return self.to_sign_in(path);
            }
        }

        GuardOutcome::Render
    }

    fn to_sign_in(&self, path: &str) -> GuardOutcome {
        debug!("No session, redirecting {} to sign-in", path);
        GuardOutcome::Redirect {
            to: self.ctx.paths().sign_in.clone(),
            from: Some(path.to_string()),
        }
    }
}

pub struct PermissionGuard<'a> {
    ctx: &'a AuthContext,
    required: Vec<String>,
}

impl<'a> PermissionGuard<'a> {
    pub fn new<I, S>(ctx: &'a AuthContext, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ctx,
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn evaluate(&self) -> GuardOutcome {
        if !self.ctx.is_ready() {
            return GuardOutcome::Pending;
        }

        if self.ctx.has_any(self.required.as_slice()) {
            GuardOutcome::Render
        } else {
            debug!(required = ?self.required, "Permission denied, redirecting home");
            GuardOutcome::Redirect {
                to: self.ctx.paths().home.clone(),
                from: None,
            }
        }
    }
}
