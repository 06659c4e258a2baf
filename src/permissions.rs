use axum::http::Method;

use crate::{
    auth::Actor,
    error::{AppError, AppResult},
};

/// GET, HEAD and OPTIONS never mutate state.
pub fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Access rules attached to an endpoint family.
///
/// Evaluation is two-phase: [`Policy::check`] runs before anything is loaded, and
/// [`Policy::check_object`] runs once the target object (and its author) is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
    /// Anyone may read; writes need an admin (admin role or staff flag).
    AdminOrReadOnly,
    /// Anyone may read; any authenticated user may create; only the author,
    /// an admin or a moderator may change or delete an existing object.
    AuthorOrStaffOrReadOnly,
    /// Admins only, for every method.
    AdminOnly,
    /// Any authenticated user, for every method.
    Authenticated,
}

impl Policy {
    pub fn has_permission(self, method: &Method, actor: &Actor) -> bool {
        match self {
            Policy::AdminOrReadOnly => {
                is_safe(method) || actor.user().is_some_and(|user| user.is_admin())
            }
            Policy::AuthorOrStaffOrReadOnly => is_safe(method) || actor.is_authenticated(),
            Policy::AdminOnly => actor.user().is_some_and(|user| user.is_admin()),
            Policy::Authenticated => actor.is_authenticated(),
        }
    }

    pub fn has_object_permission(self, method: &Method, actor: &Actor, author_id: i32) -> bool {
        match self {
            Policy::AuthorOrStaffOrReadOnly => {
                is_safe(method)
                    || actor.user().is_some_and(|user| {
                        user.id == author_id || user.is_admin() || user.is_moderator()
                    })
            }
            other => other.has_permission(method, actor),
        }
    }

    pub fn check(self, method: &Method, actor: &Actor) -> AppResult<()> {
        if self.has_permission(method, actor) { Ok(()) } else { Err(denied(actor)) }
    }

    pub fn check_object(self, method: &Method, actor: &Actor, author_id: i32) -> AppResult<()> {
        if self.has_object_permission(method, actor, author_id) {
            Ok(())
        } else {
            Err(denied(actor))
        }
    }
}

fn denied(actor: &Actor) -> AppError {
    if actor.is_authenticated() {
        AppError::PermissionDenied
    } else {
        AppError::AuthenticationRequired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::{self, Role};

    fn actor(id: i32, role: Role, is_staff: bool) -> Actor {
        Actor::User(user::Model {
            id,
            username: format!("user{id}"),
            username_folded: format!("user{id}"),
            email: format!("user{id}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
            bio: None,
            role,
            is_staff,
            last_login: None,
            date_joined: 0,
        })
    }

    #[test]
    fn safe_methods() {
        assert!(is_safe(&Method::GET));
        assert!(is_safe(&Method::HEAD));
        assert!(!is_safe(&Method::POST));
        assert!(!is_safe(&Method::PATCH));
    }

    #[test]
    fn admin_or_read_only() {
        let policy = Policy::AdminOrReadOnly;
        assert!(policy.has_permission(&Method::GET, &Actor::Anonymous));
        assert!(!policy.has_permission(&Method::POST, &Actor::Anonymous));
        assert!(!policy.has_permission(&Method::POST, &actor(1, Role::User, false)));
        assert!(!policy.has_permission(&Method::POST, &actor(1, Role::Moderator, false)));
        assert!(policy.has_permission(&Method::POST, &actor(1, Role::Admin, false)));
        assert!(policy.has_permission(&Method::DELETE, &actor(1, Role::User, true)));
    }

    #[test]
    fn author_or_staff_endpoint_phase() {
        let policy = Policy::AuthorOrStaffOrReadOnly;
        assert!(policy.has_permission(&Method::GET, &Actor::Anonymous));
        assert!(!policy.has_permission(&Method::POST, &Actor::Anonymous));
        assert!(policy.has_permission(&Method::POST, &actor(2, Role::User, false)));
    }

    #[test]
    fn author_or_staff_object_phase() {
        let policy = Policy::AuthorOrStaffOrReadOnly;
        let author = 10;
        assert!(policy.has_object_permission(&Method::GET, &Actor::Anonymous, author));
        assert!(policy.has_object_permission(&Method::PATCH, &actor(author, Role::User, false), author));
        assert!(!policy.has_object_permission(&Method::PATCH, &actor(11, Role::User, false), author));
        assert!(policy.has_object_permission(&Method::DELETE, &actor(11, Role::Moderator, false), author));
        assert!(policy.has_object_permission(&Method::DELETE, &actor(11, Role::Admin, false), author));
        assert!(policy.has_object_permission(&Method::DELETE, &actor(11, Role::User, true), author));
        assert!(!policy.has_object_permission(&Method::DELETE, &Actor::Anonymous, author));
    }

    #[test]
    fn denial_distinguishes_anonymous_from_forbidden() {
        assert!(matches!(
            Policy::AdminOnly.check(&Method::GET, &Actor::Anonymous),
            Err(AppError::AuthenticationRequired)
        ));
        assert!(matches!(
            Policy::AdminOnly.check(&Method::GET, &actor(1, Role::Moderator, false)),
            Err(AppError::PermissionDenied)
        ));
        assert!(Policy::Authenticated.check(&Method::PATCH, &actor(1, Role::User, false)).is_ok());
    }
}
