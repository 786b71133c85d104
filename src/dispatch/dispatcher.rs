//! The per-conversation state machine.
//!
//! Every inbound event enters [`Dispatcher::handle`], which consults the
//! session table and the role policy, may read/write the user, pending,
//! and order registries, and emits zero or more outbound notifications.
//! Rules are evaluated in a fixed priority order; the first matching rule
//! wins and its actions are exclusive of all others for that event.

use crate::auth::{account_status, visible_active_users};
use crate::config::{BotConfig, SYSTEM_ADMIN_ID};
use crate::dispatch::event::{
    ActiveEntry, Command, Event, EventPayload, Menu, MenuAction, Outgoing, PendingEntry,
};
use crate::dispatch::labels::{self, ADMIN_ROLE_LABEL};
use crate::dispatch::validate::is_valid_display_name;
use crate::error::{Error, OrderError, RegistryError};
use crate::model::{AccountStatus, Identity, PendingRecord, Role, UserRecord};
use crate::registry::{OrderRegistry, UserRegistry};
use crate::session::{SessionState, SessionStore};

const NO_HANDLE: &str = "no username";

/// The conversation dispatcher. Owns the session table; expects to be the
/// single consumer of an ordered event stream (no interleaving for the
/// same identity).
pub struct Dispatcher {
    config: BotConfig,
    users: UserRegistry,
    orders: OrderRegistry,
    sessions: SessionStore,
}

impl Dispatcher {
    pub fn new(config: BotConfig, users: UserRegistry, orders: OrderRegistry) -> Self {
        Self {
            config,
            users,
            orders,
            sessions: SessionStore::new(),
        }
    }

    /// Process one inbound event. Never panics and never leaves a
    /// half-applied transition: unexpected registry failures clear the
    /// caller's session and come back as a diagnostic reply.
    pub async fn handle(&mut self, event: Event) -> Vec<Outgoing> {
        let from = event.from;
        match self.dispatch(event).await {
            Ok(out) => out,
            Err(e) => {
                tracing::error!(from, error = %e, "Dispatch failed");
                self.sessions.clear(from);
                vec![Outgoing::text(
                    from,
                    "Something went wrong, please try again.",
                )]
            }
        }
    }

    async fn dispatch(&mut self, event: Event) -> Result<Vec<Outgoing>, Error> {
        let Event {
            from,
            handle,
            payload,
        } = event;
        let users = self.users.users().await?;
        let pending = self.users.pending().await?;
        let status = account_status(from, &users, &pending, self.config.admin_id);
        let state = self.sessions.get(from);

        // Rule 1: a pending role choice consumes the event first.
        if let SessionState::AwaitingRoleChoice { target } = state {
            return self.role_choice(from, target, &payload, &status).await;
        }

        // Rule 2: command literals short-circuit regardless of state.
        if let EventPayload::Text(text) = &payload {
            if let Some(cmd) = Command::parse(text) {
                return self.command(from, cmd, &users, &pending, &status).await;
            }
        }

        // Rule 3: unapproved free text is a display-name submission.
        if !status.is_approved()
            && matches!(
                state,
                SessionState::Idle | SessionState::AwaitingRegistrationName
            )
        {
            if let EventPayload::Text(text) = &payload {
                return Ok(self.name_submission(from, text));
            }
        }

        // Rule 4: contact payload completes a registration.
        if let SessionState::AwaitingRegistrationContact { name } = &state {
            return match &payload {
                EventPayload::Contact { phone } => {
                    self.complete_registration(from, handle, name.clone(), phone.clone())
                        .await
                }
                _ => Ok(vec![Outgoing::text(
                    from,
                    "Now share your phone number with the button below:",
                )
                .with_menu(Menu::ShareContact)]),
            };
        }
        if let EventPayload::Contact { .. } = &payload {
            if !status.is_approved() {
                return Ok(vec![Outgoing::text(
                    from,
                    "First enter your name to register:",
                )]);
            }
        }

        // Rule 5: photographic evidence feeds an awaiting order window.
        if let EventPayload::Photo { token } = &payload {
            match state {
                SessionState::AwaitingStartEvidence { order } => {
                    return self.attach_start(from, order, token.clone()).await;
                }
                SessionState::AwaitingFinishEvidence { order } => {
                    return self.attach_finish(from, order, token.clone()).await;
                }
                _ => {}
            }
        }

        // Rule 6: feedback window forwards or cancels.
        if state == SessionState::AwaitingFeedback {
            return Ok(self.feedback(from, &payload));
        }

        // Rule 7: role-gated menu actions.
        if let EventPayload::Action(action) = payload {
            return self
                .menu_action(from, handle, action, &users, &pending, &status)
                .await;
        }

        // Rule 8: the menu appropriate to the caller's effective role.
        Ok(vec![self.default_menu(from, &status)])
    }

    // ── Rule 1: role choice ─────────────────────────────────────────

    async fn role_choice(
        &mut self,
        approver: Identity,
        target: Identity,
        payload: &EventPayload,
        status: &AccountStatus,
    ) -> Result<Vec<Outgoing>, Error> {
        let system_admin = status.is_system_admin();
        let label = match payload {
            EventPayload::Action(MenuAction::ChooseRole { role }) => Some(role.as_str()),
            EventPayload::Text(text) => Some(text.as_str()),
            _ => None,
        };
        let Some(role) = label.and_then(|l| self.role_from_label(l, system_admin)) else {
            // Invalid choice: re-prompt, state unchanged.
            return Ok(vec![Outgoing::text(
                approver,
                "Choose a role from the offered buttons.",
            )
            .with_menu(Menu::RoleChoice {
                roles: self.permitted_role_labels(system_admin),
            })]);
        };

        self.sessions.clear(approver);
        match self.users.approve(target, role).await {
            Ok(approved) => {
                let mut to_user = Outgoing::text(
                    target,
                    format!(
                        "Your application has been approved! Your role: {}",
                        display_role(&approved.role)
                    ),
                );
                if matches!(approved.role, Role::Worker(_)) {
                    to_user = to_user.with_menu(Menu::User);
                }
                Ok(vec![
                    to_user,
                    Outgoing::text(
                        approver,
                        format!(
                            "User approved and assigned role: {}",
                            display_role(&approved.role)
                        ),
                    )
                    .with_menu(Menu::UsersDirectory),
                ])
            }
            Err(RegistryError::PendingNotFound(_)) => Ok(vec![Outgoing::text(
                approver,
                "Error: the user is no longer awaiting approval.",
            )
            .with_menu(Menu::UsersDirectory)]),
            Err(e) => Err(e.into()),
        }
    }

    // ── Rule 2: command literals ────────────────────────────────────

    async fn command(
        &mut self,
        from: Identity,
        cmd: Command,
        users: &[UserRecord],
        pending: &[PendingRecord],
        status: &AccountStatus,
    ) -> Result<Vec<Outgoing>, Error> {
        match cmd {
            Command::Start => Ok(vec![self.start(from, status)]),
            Command::CreateOrder { owner } => {
                if !status.is_admin() {
                    // Unauthorized command: silently ignored.
                    return Ok(Vec::new());
                }
                let Some(owner) = owner else {
                    return Ok(vec![Outgoing::text(from, "Usage: /create_order <user id>")]);
                };
                let owner_status = account_status(owner, users, pending, self.config.admin_id);
                if !owner_status.is_approved() {
                    return Ok(vec![Outgoing::text(
                        from,
                        format!("User {owner} is not approved; order not created."),
                    )]);
                }
                let order = self.orders.create(owner).await?;
                Ok(vec![Outgoing::text(
                    from,
                    format!("Created order {} for user {}", order.id, owner),
                )])
            }
            Command::StartWork { order } => self.start_work(from, order).await,
            Command::FinishWork { order } => self.finish_work(from, order).await,
        }
    }

    fn start(&mut self, from: Identity, status: &AccountStatus) -> Outgoing {
        match status {
            AccountStatus::Approved(role) if role.is_admin() => {
                Outgoing::text(from, "You are in the admin panel.").with_menu(Menu::Admin)
            }
            AccountStatus::Approved(_) => {
                Outgoing::text(from, "You are already registered.").with_menu(Menu::User)
            }
            _ => {
                self.sessions
                    .set(from, SessionState::AwaitingRegistrationName);
                Outgoing::text(from, "Please enter your name to register:")
                    .with_menu(Menu::ShareContact)
            }
        }
    }

    async fn start_work(
        &mut self,
        from: Identity,
        order: Option<i64>,
    ) -> Result<Vec<Outgoing>, Error> {
        let Some(id) = order else {
            return Ok(vec![Outgoing::text(from, "Invalid order id.")]);
        };
        let order = match self.orders.get_owned(id, from).await {
            Ok(order) => order,
            Err(OrderError::NotFound(_)) => {
                return Ok(vec![Outgoing::text(from, "Order not found.")]);
            }
            Err(e) => return Err(e.into()),
        };
        if order.status == crate::model::OrderStatus::Completed {
            return Ok(vec![Outgoing::text(
                from,
                format!("Order {id} is already completed."),
            )]);
        }
        if order.start_evidence.is_some() {
            return Ok(vec![Outgoing::text(
                from,
                "Work on this order has already started.",
            )]);
        }
        self.sessions
            .set(from, SessionState::AwaitingStartEvidence { order: id });
        Ok(vec![Outgoing::text(from, "Send a photo of the work start.")])
    }

    async fn finish_work(
        &mut self,
        from: Identity,
        order: Option<i64>,
    ) -> Result<Vec<Outgoing>, Error> {
        let Some(id) = order else {
            return Ok(vec![Outgoing::text(from, "Invalid order id.")]);
        };
        let order = match self.orders.get_owned(id, from).await {
            Ok(order) => order,
            Err(OrderError::NotFound(_)) => {
                return Ok(vec![Outgoing::text(from, "Order not found.")]);
            }
            Err(e) => return Err(e.into()),
        };
        if order.status == crate::model::OrderStatus::Completed || order.end_evidence.is_some() {
            return Ok(vec![Outgoing::text(
                from,
                format!("Order {id} is already completed."),
            )]);
        }
        if order.start_evidence.is_none() {
            return Ok(vec![Outgoing::text(from, "Start the work first.")]);
        }
        self.sessions
            .set(from, SessionState::AwaitingFinishEvidence { order: id });
        Ok(vec![Outgoing::text(
            from,
            "Send a photo of the finished work.",
        )])
    }

    // ── Rule 3: display-name submission ─────────────────────────────

    fn name_submission(&mut self, from: Identity, text: &str) -> Vec<Outgoing> {
        if !is_valid_display_name(text, &self.config.worker_roles) {
            // Non-terminal rejection: the caller stays in the awaiting-name state.
            return vec![Outgoing::text(
                from,
                "That name is not allowed. Please enter another name \
                 (letters, digits, spaces, 2-32 characters).",
            )];
        }
        self.sessions.set(
            from,
            SessionState::AwaitingRegistrationContact {
                name: text.to_string(),
            },
        );
        vec![
            Outgoing::text(from, "Now share your phone number with the button below:")
                .with_menu(Menu::ShareContact),
        ]
    }

    // ── Rule 4: registration completion ─────────────────────────────

    async fn complete_registration(
        &mut self,
        from: Identity,
        handle: Option<String>,
        name: String,
        phone: String,
    ) -> Result<Vec<Outgoing>, Error> {
        let handle = handle.unwrap_or_else(|| NO_HANDLE.to_string());
        self.users
            .submit_pending(PendingRecord {
                id: from,
                display_name: name,
                contact_handle: handle.clone(),
                phone,
            })
            .await?;
        self.sessions.clear(from);

        let mut out = self.fan_out(
            format!("New user @{handle} ({from}) awaits approval"),
            Some(from),
        );
        out.push(Outgoing::text(
            from,
            "Thanks! Your application has been sent to the administrator.",
        ));
        Ok(out)
    }

    // ── Rule 5: evidence attachment ─────────────────────────────────

    async fn attach_start(
        &mut self,
        from: Identity,
        order: i64,
        token: String,
    ) -> Result<Vec<Outgoing>, Error> {
        self.sessions.clear(from);
        let reply = match self.orders.attach_start_evidence(order, from, token).await {
            Ok(_) => "Work start confirmed.".to_string(),
            Err(OrderError::NotFound(_)) => "Order not found.".to_string(),
            Err(OrderError::AlreadyStarted(_)) => {
                "Work on this order has already started.".to_string()
            }
            Err(OrderError::Completed(id)) => format!("Order {id} is already completed."),
            Err(e) => return Err(e.into()),
        };
        Ok(vec![Outgoing::text(from, reply)])
    }

    async fn attach_finish(
        &mut self,
        from: Identity,
        order: i64,
        token: String,
    ) -> Result<Vec<Outgoing>, Error> {
        self.sessions.clear(from);
        let reply = match self.orders.attach_finish_evidence(order, from, token).await {
            Ok(_) => "Work completed.".to_string(),
            Err(OrderError::NotFound(_)) => "Order not found.".to_string(),
            Err(OrderError::NotStarted(_)) => "Start the work first.".to_string(),
            Err(OrderError::Completed(id)) => format!("Order {id} is already completed."),
            Err(e) => return Err(e.into()),
        };
        Ok(vec![Outgoing::text(from, reply)])
    }

    // ── Rule 6: feedback window ─────────────────────────────────────

    fn feedback(&mut self, from: Identity, payload: &EventPayload) -> Vec<Outgoing> {
        let cancelled = matches!(payload, EventPayload::Action(MenuAction::Cancel))
            || matches!(payload, EventPayload::Text(t) if t == labels::CANCEL);
        if cancelled {
            self.sessions.clear(from);
            return vec![Outgoing::text(
                from,
                "Action cancelled. Choose an action from the menu:",
            )
            .with_menu(Menu::User)];
        }
        let EventPayload::Text(text) = payload else {
            return vec![Outgoing::text(
                from,
                "Please enter your message for the administrator:",
            )
            .with_menu(Menu::CancelOnly)];
        };
        self.sessions.clear(from);
        let mut out = self.fan_out(format!("💬 Feedback from user {from}: {text}"), None);
        out.push(
            Outgoing::text(
                from,
                "Your message has been sent to the administrator. \
                 Choose an action from the menu:",
            )
            .with_menu(Menu::User),
        );
        out
    }

    // ── Rule 7: menu actions ────────────────────────────────────────

    async fn menu_action(
        &mut self,
        from: Identity,
        handle: Option<String>,
        action: MenuAction,
        users: &[UserRecord],
        pending: &[PendingRecord],
        status: &AccountStatus,
    ) -> Result<Vec<Outgoing>, Error> {
        let is_admin = status.is_admin();
        match action {
            MenuAction::ReportHelp => {
                let handle = handle.unwrap_or_else(|| NO_HANDLE.to_string());
                let mut out =
                    self.fan_out(format!("User {from} (@{handle}) requested help"), None);
                out.push(Outgoing::text(
                    from,
                    "The administrator has been notified. Please wait.",
                ));
                Ok(out)
            }
            MenuAction::Cancel => {
                self.sessions.clear(from);
                Ok(vec![self.default_menu(from, status)])
            }
            MenuAction::MyOrders if status.is_approved() && !is_admin => {
                let orders = self.orders.list_by_owner(from).await?;
                let text = if orders.is_empty() {
                    "You have no orders yet.".to_string()
                } else {
                    orders
                        .iter()
                        .map(|o| format!("#{} - {}", o.id, o.status))
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                Ok(vec![Outgoing::text(from, text).with_menu(Menu::User)])
            }
            MenuAction::ComposeFeedback if status.is_approved() && !is_admin => {
                self.sessions.set(from, SessionState::AwaitingFeedback);
                Ok(vec![Outgoing::text(
                    from,
                    "Please enter your message for the administrator:",
                )
                .with_menu(Menu::CancelOnly)])
            }
            MenuAction::BrowseUsers | MenuAction::Back if is_admin => {
                Ok(vec![
                    Outgoing::text(from, "Choose a category:").with_menu(Menu::UsersDirectory)
                ])
            }
            MenuAction::ListActive if is_admin => {
                let visible = visible_active_users(from, status.is_system_admin(), users);
                if visible.is_empty() {
                    return Ok(vec![Outgoing::text(from, "No active users.")
                        .with_menu(Menu::UsersDirectory)]);
                }
                let entries = visible
                    .iter()
                    .map(|u| ActiveEntry {
                        id: u.id,
                        name: u.display_name.clone(),
                        role: u.role.label().to_string(),
                    })
                    .collect();
                Ok(vec![Outgoing::text(from, "Active users:")
                    .with_menu(Menu::ActiveUsers(entries))])
            }
            MenuAction::ListPending if is_admin => {
                if pending.is_empty() {
                    return Ok(vec![Outgoing::text(from, "No pending users.")
                        .with_menu(Menu::UsersDirectory)]);
                }
                let entries = pending
                    .iter()
                    .map(|p| PendingEntry {
                        id: p.id,
                        name: p.display_name.clone(),
                    })
                    .collect();
                Ok(vec![Outgoing::text(from, "Pending users:")
                    .with_menu(Menu::PendingUsers(entries))])
            }
            MenuAction::ApproveUser { id } if is_admin => {
                if !pending.iter().any(|p| p.id == id) {
                    return Ok(vec![Outgoing::text(
                        from,
                        "Error: the user is no longer awaiting approval.",
                    )
                    .with_menu(Menu::UsersDirectory)]);
                }
                self.sessions
                    .set(from, SessionState::AwaitingRoleChoice { target: id });
                Ok(vec![Outgoing::text(from, "Choose a role for the user:").with_menu(
                    Menu::RoleChoice {
                        roles: self.permitted_role_labels(status.is_system_admin()),
                    },
                )])
            }
            MenuAction::RemoveUser { id } if is_admin => {
                let Some(target) = users.iter().find(|u| u.id == id) else {
                    return Ok(vec![Outgoing::text(from, "User not found.")]);
                };
                if target.role.is_admin() {
                    return Ok(vec![Outgoing::text(
                        from,
                        "Actions with this user are not available.",
                    )]);
                }
                match self.users.remove(id).await {
                    Ok(_) => Ok(vec![
                        Outgoing::text(from, "User removed.").with_menu(Menu::UsersDirectory)
                    ]),
                    Err(RegistryError::UserNotFound(_)) => {
                        Ok(vec![Outgoing::text(from, "User not found.")])
                    }
                    Err(e) => Err(e.into()),
                }
            }
            // Unauthorized or out-of-place actions never reveal restricted
            // options; answer with the caller's own menu.
            _ => Ok(vec![self.default_menu(from, status)]),
        }
    }

    // ── Rule 8 & helpers ────────────────────────────────────────────

    fn default_menu(&self, from: Identity, status: &AccountStatus) -> Outgoing {
        match status {
            AccountStatus::Approved(role) if role.is_admin() => {
                Outgoing::text(from, "Choose an action:").with_menu(Menu::Admin)
            }
            AccountStatus::Approved(_) => {
                Outgoing::text(from, "Choose an action from the menu:").with_menu(Menu::User)
            }
            AccountStatus::Pending => {
                Outgoing::text(from, "Your application is awaiting review.")
            }
            AccountStatus::Guest => Outgoing::text(from, "Please enter your name to register:")
                .with_menu(Menu::ShareContact),
        }
    }

    /// One copy to the system admin and one to the business admin, unless
    /// they are the same identity, in which case exactly one is sent.
    fn fan_out(&self, text: String, exclude: Option<Identity>) -> Vec<Outgoing> {
        let mut recipients = vec![SYSTEM_ADMIN_ID];
        if self.config.admin_id != SYSTEM_ADMIN_ID {
            recipients.push(self.config.admin_id);
        }
        recipients
            .into_iter()
            .filter(|r| Some(*r) != exclude)
            .map(|r| Outgoing::text(r, text.clone()))
            .collect()
    }

    fn permitted_role_labels(&self, system_admin: bool) -> Vec<String> {
        let mut roles = self.config.worker_roles.clone();
        if system_admin {
            roles.push(ADMIN_ROLE_LABEL.to_string());
        }
        roles
    }

    fn role_from_label(&self, label: &str, system_admin: bool) -> Option<Role> {
        if label == ADMIN_ROLE_LABEL {
            // Only the system admin may grant the admin role.
            return system_admin.then_some(Role::Admin);
        }
        self.config
            .worker_roles
            .iter()
            .any(|r| r == label)
            .then(|| Role::Worker(label.to_string()))
    }
}

/// Human-facing role wording for notifications.
fn display_role(role: &Role) -> &str {
    match role {
        Role::Admin | Role::SystemAdmin => ADMIN_ROLE_LABEL,
        Role::Worker(kind) => kind,
    }
}
