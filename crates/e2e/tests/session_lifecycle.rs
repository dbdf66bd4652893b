use clubhouse_common::Role;
use clubhouse_e2e::{Credentials, E2eError, HarnessConfig, SessionController, SimulatedClubApp};

fn controller() -> SessionController {
    SessionController::new(&HarnessConfig::default())
}

/// Session Isolation Test
///
/// Each role gets its own session: a guest session carries no identity, a
/// signed-in one carries the display name, and a second role cannot sign in
/// while the first session is still held.
#[tokio::test]
async fn one_session_at_a_time() {
    let mut app = SimulatedClubApp::new();
    let credentials = SimulatedClubApp::credentials();
    let mut sessions = controller();

    let mut guest = sessions.establish(&mut app, Role::Guest, None).await.unwrap();
    assert_eq!(guest.identity(), None);
    assert_eq!(app.signed_in_as(), None);
    sessions.teardown(&mut app, &mut guest).await.unwrap();

    let mut member = sessions
        .establish(&mut app, Role::Member, credentials.get(Role::Member))
        .await
        .unwrap();
    assert_eq!(member.identity(), Some("Mia Member"));
    assert_eq!(sessions.active_role(), Some(Role::Member));

    let err = sessions
        .establish(&mut app, Role::Owner, credentials.get(Role::Owner))
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::SessionStillActive(Role::Member)));
    assert_eq!(app.signed_in_as(), Some("mia"));

    sessions.teardown(&mut app, &mut member).await.unwrap();
    assert_eq!(app.signed_in_as(), None);
    assert_eq!(sessions.active_role(), None);
}

/// Idempotent Teardown Test
///
/// Tearing the same session down twice is harmless, and the next role
/// starts from a clean browser.
#[tokio::test]
async fn teardown_twice_then_switch_roles() {
    let mut app = SimulatedClubApp::new();
    let credentials = SimulatedClubApp::credentials();
    let mut sessions = controller();

    let mut admin = sessions
        .establish(&mut app, Role::Admin, credentials.get(Role::Admin))
        .await
        .unwrap();
    sessions.teardown(&mut app, &mut admin).await.unwrap();
    assert!(admin.is_cleared());
    sessions.teardown(&mut app, &mut admin).await.unwrap();

    let owner = sessions
        .establish(&mut app, Role::Owner, credentials.get(Role::Owner))
        .await
        .unwrap();
    assert_eq!(owner.role(), Role::Owner);
    assert_ne!(owner.id(), admin.id());
    assert_eq!(app.signed_in_as(), Some("olivia"));
}

/// Credential Guard Test
///
/// Missing and placeholder credentials are rejected before the browser is
/// asked to sign in.
#[tokio::test]
async fn missing_or_placeholder_credentials_are_rejected() {
    let mut app = SimulatedClubApp::new();
    let mut sessions = controller();

    let err = sessions.establish(&mut app, Role::Admin, None).await.unwrap_err();
    assert!(matches!(err, E2eError::CredentialsMissing(Role::Admin)));

    let placeholder = Credentials::new("adam", "changeme");
    let err = sessions
        .establish(&mut app, Role::Admin, Some(&placeholder))
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::CredentialsMissing(Role::Admin)));

    assert_eq!(app.navigations(), 0);
    assert_eq!(sessions.active_role(), None);
}

/// Failed Sign-in Test
///
/// A rejected password surfaces the application's login error, and a
/// display name mismatch is an authentication failure even though the
/// application accepted the password. Neither leaves a session behind.
#[tokio::test]
async fn failed_sign_in_leaves_no_session() {
    let mut app = SimulatedClubApp::new();
    let mut sessions = controller();

    let wrong_password = Credentials::new("mia", "not-her-password");
    let err = sessions
        .establish(&mut app, Role::Member, Some(&wrong_password))
        .await
        .unwrap_err();
    match err {
        E2eError::AuthenticationFailed { role, reason } => {
            assert_eq!(role, Role::Member);
            assert!(reason.contains("Invalid username or password"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(app.signed_in_as(), None);
    assert_eq!(sessions.active_role(), None);

    let impostor = Credentials::new("adam", "admin-pass-1").with_display_name("Olivia Owner");
    let err = sessions
        .establish(&mut app, Role::Owner, Some(&impostor))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("signed in as 'Adam Admin'"), "{err}");
    assert_eq!(app.signed_in_as(), None);
    assert_eq!(sessions.active_role(), None);
}
