//! Request handlers for every route the application serves.
//!
//! Handlers follow one shape: resolve the session first, talk to the backend
//! with a per-request credential, and return either rendered HTML or a
//! "303 See Other" redirect. Expenses and income are the same flow over two
//! backend collections, so both route families share the section handlers
//! below.

use std::convert::Infallible;

use axum::extract::{Path, Query, RawForm, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use futures_core::Stream;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use serde::Deserialize;

use crate::AppState;
use crate::auth::{
    DEFAULT_AFTER_LOGIN, Identity, login_location, optional_user, require_user, sanitize_next,
};
use crate::client::{ApiError, ListQuery, Page, Record, Resource};
use crate::error::Error;
use crate::form::{
    FieldErrors, FormFields, LoginForm, RecordForm, RegisterForm, Validated, decode_form,
};
use crate::html;

/// Records shown per list page.
const PAGE_SIZE: u32 = 10;

/// The toast stored on the session when a backend mutation fails.
const MUTATION_FAILED_TOAST: &str = "Something went wrong. Please, try again later.";

#[derive(Debug, Deserialize)]
pub(crate) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    page: Option<u32>,
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// The two record sections served under the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Expenses,
    Income,
}

impl Section {
    fn resource(self) -> Resource {
        match self {
            Section::Expenses => Resource::Expenses,
            Section::Income => Resource::Invoices,
        }
    }

    fn log_resource(self) -> Resource {
        match self {
            Section::Expenses => Resource::ExpenseLogs,
            Section::Income => Resource::InvoiceLogs,
        }
    }

    fn base_path(self) -> &'static str {
        match self {
            Section::Expenses => "/dashboard/expenses",
            Section::Income => "/dashboard/income",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Section::Expenses => "Expenses",
            Section::Income => "Income",
        }
    }
}

pub(crate) async fn home(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    if optional_user(&state.sessions, &headers).is_some() {
        return see_other(DEFAULT_AFTER_LOGIN, &[]);
    }
    let body = "<h1>Tally</h1>\
         <p>Track your expenses and income in one place.</p>\
         <p><a href=\"/login\">Log in</a> or <a href=\"/signup\">sign up</a>.</p>";
    Ok(Html(html::page("Welcome", body)).into_response())
}

pub(crate) async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
) -> Result<Response, Error> {
    if optional_user(&state.sessions, &headers).is_some() {
        return see_other(DEFAULT_AFTER_LOGIN, &[]);
    }
    Ok(login_response(
        query.next.as_deref(),
        &FormFields::new(),
        &FieldErrors::new(),
        StatusCode::OK,
    ))
}

pub(crate) async fn login_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    RawForm(body): RawForm,
) -> Result<Response, Error> {
    if optional_user(&state.sessions, &headers).is_some() {
        return see_other(DEFAULT_AFTER_LOGIN, &[]);
    }

    let fields = decode_form(&body);
    let form = match LoginForm::validate(&fields) {
        Validated::Valid(form) => form,
        Validated::Invalid(errors) => {
            return Ok(login_response(
                query.next.as_deref(),
                &fields,
                &errors,
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    match state.backend.login(&form.email, &form.password).await {
        Ok(login) => {
            let cookie = state.sessions.create(&login.user_id, &login.access_token);
            see_other(sanitize_next(query.next.as_deref()), &[cookie.as_str()])
        }
        Err(ApiError::Rejected { detail }) if detail == "LOGIN_BAD_CREDENTIALS" => {
            Ok(login_response(
                query.next.as_deref(),
                &fields,
                &LoginForm::bad_credentials(),
                StatusCode::BAD_REQUEST,
            ))
        }
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn signup_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    if optional_user(&state.sessions, &headers).is_some() {
        return see_other(DEFAULT_AFTER_LOGIN, &[]);
    }
    Ok(signup_response(
        &FormFields::new(),
        &FieldErrors::new(),
        StatusCode::OK,
    ))
}

pub(crate) async fn signup_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Result<Response, Error> {
    if optional_user(&state.sessions, &headers).is_some() {
        return see_other(DEFAULT_AFTER_LOGIN, &[]);
    }

    let fields = decode_form(&body);
    let form = match RegisterForm::validate(&fields) {
        Validated::Valid(form) => form,
        Validated::Invalid(errors) => {
            return Ok(signup_response(&fields, &errors, StatusCode::BAD_REQUEST));
        }
    };

    match state.backend.register(&form.email, &form.password).await {
        Ok(()) => {}
        Err(ApiError::Rejected { detail }) if detail == "REGISTER_USER_ALREADY_EXISTS" => {
            let mut errors = FieldErrors::new();
            errors.insert(
                "email",
                "An account with this email already exists.".to_owned(),
            );
            return Ok(signup_response(&fields, &errors, StatusCode::BAD_REQUEST));
        }
        Err(err) => return Err(err.into()),
    }

    if let Err(err) = state.backend.request_verify_token(&form.email).await {
        tracing::warn!(error = %err, "could not request a verification email");
    }
    Ok(Html(message_page(
        "Check your email",
        "Your account was created. We sent you an email with a link to \
         verify your address; follow it and then log in.",
    ))
    .into_response())
}

pub(crate) async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Response, Error> {
    let Some(token) = query.token.filter(|token| !token.is_empty()) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Html(message_page(
                "Verification failed",
                "This verification link is missing its token.",
            )),
        )
            .into_response());
    };

    match state.backend.verify(&token).await {
        Ok(()) => Ok(Html(message_page(
            "Email verified",
            "Your email address is verified. You can now <a href=\"/login\">log in</a>.",
        ))
        .into_response()),
        Err(ApiError::Rejected { .. }) => Ok((
            StatusCode::BAD_REQUEST,
            Html(message_page(
                "Verification failed",
                "This verification link is invalid or has expired.",
            )),
        )
            .into_response()),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    if let Some(identity) = optional_user(&state.sessions, &headers) {
        // The cookie is cleared regardless; an unreachable backend must not
        // leave the browser logged in.
        if let Err(err) = state.backend.with_token(identity.token()).logout().await {
            tracing::warn!(error = %err, "backend logout failed, clearing the session anyway");
        }
    }
    see_other("/", &[state.sessions.destroy().as_str()])
}

pub(crate) async fn google_login(State(state): State<AppState>) -> Result<Response, Error> {
    let url = state.backend.google_authorize_url().await?;
    see_other(&url, &[])
}

pub(crate) async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, Error> {
    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err(Error::with_status(
            "OAuth callback is missing its code or state parameter",
            StatusCode::BAD_REQUEST,
        ));
    };
    let login = state.backend.google_callback(&code, &oauth_state).await?;
    let cookie = state.sessions.create(&login.user_id, &login.access_token);
    see_other(DEFAULT_AFTER_LOGIN, &[cookie.as_str()])
}

pub(crate) async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let identity = require_user(&state.sessions, &headers, "/dashboard")?;
    let authorized = state.backend.with_token(identity.token());

    let (expense, invoice) = tokio::join!(
        authorized.first(Resource::Expenses),
        authorized.first(Resource::Invoices),
    );
    let expense = unauthorized_to_login(expense, &state, "/dashboard")?;
    let invoice = unauthorized_to_login(invoice, &state, "/dashboard")?;

    let body = format!(
        "<h1>Dashboard</h1>\
         <ul>\
         <li>{}</li>\
         <li>{}</li>\
         </ul>\
         <form method=\"post\" action=\"/logout\"><button>Log out</button></form>",
        section_link(Section::Expenses, expense.as_ref()),
        section_link(Section::Income, invoice.as_ref()),
    );
    Ok(Html(html::page("Dashboard", &body)).into_response())
}

pub(crate) async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Error> {
    let identity = require_user(&state.sessions, &headers, "/dashboard")?;
    let mut subscription = state.notifier.subscribe(identity.user_id());

    let stream = async_stream::stream! {
        while subscription.recv().await.is_some() {
            yield Ok(Event::default().event("refresh").data("refresh"));
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub(crate) async fn expenses_list(
    state: State<AppState>,
    headers: HeaderMap,
    params: Query<ListParams>,
) -> Result<Response, Error> {
    section_list(Section::Expenses, state, headers, params).await
}

pub(crate) async fn income_list(
    state: State<AppState>,
    headers: HeaderMap,
    params: Query<ListParams>,
) -> Result<Response, Error> {
    section_list(Section::Income, state, headers, params).await
}

pub(crate) async fn expenses_create(
    state: State<AppState>,
    headers: HeaderMap,
    body: RawForm,
) -> Result<Response, Error> {
    section_create(Section::Expenses, state, headers, body).await
}

pub(crate) async fn income_create(
    state: State<AppState>,
    headers: HeaderMap,
    body: RawForm,
) -> Result<Response, Error> {
    section_create(Section::Income, state, headers, body).await
}

pub(crate) async fn expenses_detail(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<i64>,
) -> Result<Response, Error> {
    section_detail(Section::Expenses, state, headers, id).await
}

pub(crate) async fn income_detail(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<i64>,
) -> Result<Response, Error> {
    section_detail(Section::Income, state, headers, id).await
}

pub(crate) async fn expenses_update(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<i64>,
    body: RawForm,
) -> Result<Response, Error> {
    section_update(Section::Expenses, state, headers, id, body).await
}

pub(crate) async fn income_update(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<i64>,
    body: RawForm,
) -> Result<Response, Error> {
    section_update(Section::Income, state, headers, id, body).await
}

pub(crate) async fn expenses_delete(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<i64>,
) -> Result<Response, Error> {
    section_delete(Section::Expenses, state, headers, id).await
}

pub(crate) async fn income_delete(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<i64>,
) -> Result<Response, Error> {
    section_delete(Section::Income, state, headers, id).await
}

async fn section_list(
    section: Section,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Response, Error> {
    let mut identity = require_user(&state.sessions, &headers, section.base_path())?;
    let toast = identity.record_mut().take_toast();

    let query = ListQuery {
        page: params.page,
        size: Some(PAGE_SIZE),
        search: params.q.clone(),
    };
    let page = unauthorized_to_login(
        state
            .backend
            .with_token(identity.token())
            .list(section.resource(), &query)
            .await,
        &state,
        section.base_path(),
    )?;

    let mut response = Html(list_page(section, &page, &params, toast.as_deref())).into_response();
    if toast.is_some() {
        // The toast was consumed; re-commit the session so it is not shown
        // again on the next page load.
        append_cookie(
            &mut response,
            state.sessions.commit(identity.record_mut()).as_str(),
        )?;
    }
    Ok(response)
}

async fn section_create(
    section: Section,
    State(state): State<AppState>,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Result<Response, Error> {
    let mut identity = require_user(&state.sessions, &headers, section.base_path())?;

    let fields = decode_form(&body);
    let form = match RecordForm::validate(&fields) {
        Validated::Valid(form) => form,
        Validated::Invalid(errors) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Html(record_form_page(section, None, &fields, &errors)),
            )
                .into_response());
        }
    };

    let created = state
        .backend
        .with_token(identity.token())
        .create(section.resource(), &form.into_payload())
        .await;
    match created {
        Ok(_) => {
            state.notifier.emit(identity.user_id());
            see_other(section.base_path(), &[])
        }
        Err(ApiError::Unauthorized) => Err(expired_credentials(&state, section.base_path())),
        Err(err) => {
            tracing::warn!(error = %err, "record creation failed");
            mutation_failed(&state, &mut identity, section.base_path())
        }
    }
}

async fn section_detail(
    section: Section,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response, Error> {
    let detail_path = format!("{}/{id}", section.base_path());
    let identity = require_user(&state.sessions, &headers, &detail_path)?;
    let authorized = state.backend.with_token(identity.token());

    let log_query = ListQuery::default();
    let (record, logs) = tokio::join!(
        authorized.get(section.resource(), id),
        authorized.list(section.log_resource(), &log_query),
    );
    let record = unauthorized_to_login(record, &state, &detail_path)?;
    let logs = unauthorized_to_login(logs, &state, &detail_path)?;

    Ok(Html(detail_page(section, &record, &logs)).into_response())
}

async fn section_update(
    section: Section,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    RawForm(body): RawForm,
) -> Result<Response, Error> {
    let detail_path = format!("{}/{id}", section.base_path());
    let mut identity = require_user(&state.sessions, &headers, &detail_path)?;

    let fields = decode_form(&body);
    let form = match RecordForm::validate(&fields) {
        Validated::Valid(form) => form,
        Validated::Invalid(errors) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Html(record_form_page(section, Some(id), &fields, &errors)),
            )
                .into_response());
        }
    };

    let updated = state
        .backend
        .with_token(identity.token())
        .update(section.resource(), id, &form.into_payload())
        .await;
    match updated {
        Ok(_) => {
            state.notifier.emit(identity.user_id());
            see_other(section.base_path(), &[])
        }
        Err(ApiError::Unauthorized) => Err(expired_credentials(&state, &detail_path)),
        Err(err @ ApiError::NotFound) => Err(err.into()),
        Err(err) => {
            tracing::warn!(error = %err, id, "record update failed");
            mutation_failed(&state, &mut identity, section.base_path())
        }
    }
}

async fn section_delete(
    section: Section,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response, Error> {
    let mut identity = require_user(&state.sessions, &headers, section.base_path())?;

    let deleted = state
        .backend
        .with_token(identity.token())
        .delete(section.resource(), id)
        .await;
    match deleted {
        Ok(()) => {
            state.notifier.emit(identity.user_id());
            see_other(section.base_path(), &[])
        }
        Err(ApiError::Unauthorized) => Err(expired_credentials(&state, section.base_path())),
        Err(err @ ApiError::NotFound) => Err(err.into()),
        Err(err) => {
            tracing::warn!(error = %err, id, "record deletion failed");
            mutation_failed(&state, &mut identity, section.base_path())
        }
    }
}

/// Builds a "303 See Other" response, optionally committing cookies.
fn see_other(location: &str, set_cookie: &[&str]) -> Result<Response, Error> {
    let mut response = StatusCode::SEE_OTHER.into_response();
    let location = HeaderValue::from_str(location).map_err(Error::internal)?;
    response.headers_mut().insert(header::LOCATION, location);
    for cookie in set_cookie {
        append_cookie(&mut response, cookie)?;
    }
    Ok(response)
}

fn append_cookie(response: &mut Response, cookie: &str) -> Result<(), Error> {
    let value = HeaderValue::from_str(cookie).map_err(Error::internal)?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}

/// Maps a rejected bearer credential to the login redirect; the session is
/// stale even though the cookie itself still verifies.
fn unauthorized_to_login<T>(
    result: Result<T, ApiError>,
    state: &AppState,
    original_path: &str,
) -> Result<T, Error> {
    match result {
        Ok(value) => Ok(value),
        Err(ApiError::Unauthorized) => Err(expired_credentials(state, original_path)),
        Err(err) => Err(err.into()),
    }
}

fn expired_credentials(state: &AppState, original_path: &str) -> Error {
    Error::see_other_with_cookies(
        login_location(original_path),
        vec![state.sessions.destroy().into()],
    )
}

/// Stores the failure toast on the session and sends the user back to the
/// list page.
fn mutation_failed(
    state: &AppState,
    identity: &mut Identity,
    location: &str,
) -> Result<Response, Error> {
    identity.record_mut().set_toast(MUTATION_FAILED_TOAST);
    let cookie = state.sessions.commit(identity.record_mut());
    see_other(location, &[cookie.as_str()])
}

fn value<'a>(fields: &'a FormFields, name: &str) -> &'a str {
    fields.get(name).map_or("", String::as_str)
}

fn field_error(errors: &FieldErrors, name: &str) -> String {
    match errors.get(name) {
        Some(message) => format!(
            "<p class=\"field-error\" data-field=\"{name}\">{}</p>",
            html::escape(message)
        ),
        None => String::new(),
    }
}

fn login_response(
    next: Option<&str>,
    fields: &FormFields,
    errors: &FieldErrors,
    status: StatusCode,
) -> Response {
    let action = match next {
        Some(next) => login_location(next),
        None => "/login".to_owned(),
    };
    let body = format!(
        "<h1>Log in</h1>\
         <form method=\"post\" action=\"{action}\">\
         <label>Email <input type=\"email\" name=\"email\" value=\"{email}\"></label>{email_error}\
         <label>Password <input type=\"password\" name=\"password\"></label>{password_error}\
         <button>Log in</button>\
         </form>\
         <p><a href=\"/login/google\">Log in with Google</a></p>\
         <p>No account yet? <a href=\"/signup\">Sign up</a>.</p>",
        action = html::escape(&action),
        email = html::escape(value(fields, "email")),
        email_error = field_error(errors, "email"),
        password_error = field_error(errors, "password"),
    );
    (status, Html(html::page("Log in", &body))).into_response()
}

fn signup_response(fields: &FormFields, errors: &FieldErrors, status: StatusCode) -> Response {
    let body = format!(
        "<h1>Sign up</h1>\
         <form method=\"post\" action=\"/signup\">\
         <label>Email <input type=\"email\" name=\"email\" value=\"{email}\"></label>{email_error}\
         <label>Password <input type=\"password\" name=\"password\"></label>{password_error}\
         <label>Repeat password <input type=\"password\" name=\"password_confirm\"></label>{confirm_error}\
         <button>Sign up</button>\
         </form>\
         <p>Already registered? <a href=\"/login\">Log in</a>.</p>",
        email = html::escape(value(fields, "email")),
        email_error = field_error(errors, "email"),
        password_error = field_error(errors, "password"),
        confirm_error = field_error(errors, "password_confirm"),
    );
    (status, Html(html::page("Sign up", &body))).into_response()
}

fn message_page(title: &str, body_html: &str) -> String {
    html::page(
        title,
        &format!("<h1>{}</h1><p>{}</p>", html::escape(title), body_html),
    )
}

fn section_link(section: Section, first: Option<&Record>) -> String {
    match first {
        Some(record) => format!(
            "<a href=\"{}/{}\">{}: {}</a>",
            section.base_path(),
            record.id,
            section.title(),
            html::escape(&record.title),
        ),
        None => format!(
            "<a href=\"{}\">{}: nothing recorded yet</a>",
            section.base_path(),
            section.title(),
        ),
    }
}

fn record_form(section: Section, id: Option<i64>, fields: &FormFields, errors: &FieldErrors) -> String {
    let action = match id {
        Some(id) => format!("{}/{id}", section.base_path()),
        None => section.base_path().to_owned(),
    };
    format!(
        "<form method=\"post\" action=\"{action}\">\
         <label>Title <input name=\"title\" value=\"{title}\"></label>{title_error}\
         <label>Description <input name=\"description\" value=\"{description}\"></label>\
         <label>Amount <input name=\"amount\" value=\"{amount}\"></label>{amount_error}\
         <label>Date <input type=\"date\" name=\"date\" value=\"{date}\"></label>{date_error}\
         <label>Attachment <input name=\"attachment\" value=\"{attachment}\"></label>\
         <button>Save</button>\
         </form>",
        title = html::escape(value(fields, "title")),
        title_error = field_error(errors, "title"),
        description = html::escape(value(fields, "description")),
        amount = html::escape(value(fields, "amount")),
        amount_error = field_error(errors, "amount"),
        date = html::escape(value(fields, "date")),
        date_error = field_error(errors, "date"),
        attachment = html::escape(value(fields, "attachment")),
    )
}

fn record_form_page(
    section: Section,
    id: Option<i64>,
    fields: &FormFields,
    errors: &FieldErrors,
) -> String {
    let heading = match id {
        Some(_) => format!("Edit {}", section.title().to_lowercase()),
        None => format!("New {}", section.title().to_lowercase()),
    };
    html::page(
        section.title(),
        &format!(
            "<h1>{}</h1>{}<p><a href=\"{}\">Back to {}</a></p>",
            html::escape(&heading),
            record_form(section, id, fields, errors),
            section.base_path(),
            section.title(),
        ),
    )
}

fn list_page(
    section: Section,
    page: &Page<Record>,
    params: &ListParams,
    toast: Option<&str>,
) -> String {
    let mut rows = String::new();
    for record in &page.items {
        rows.push_str(&format!(
            "<tr><td><a href=\"{}/{}\">{}</a></td><td>{:.2}</td>\
             <td><form method=\"post\" action=\"{}/{}/delete\"><button>Delete</button></form></td></tr>",
            section.base_path(),
            record.id,
            html::escape(&record.title),
            record.amount,
            section.base_path(),
            record.id,
        ));
    }
    if rows.is_empty() {
        rows.push_str("<tr><td colspan=\"3\">Nothing recorded yet.</td></tr>");
    }

    let current = params.page.unwrap_or(1);
    let mut pager = String::new();
    if current > 1 {
        pager.push_str(&format!(
            "<a href=\"{}?page={}\">Previous</a> ",
            section.base_path(),
            current - 1,
        ));
    }
    if i64::from(current) < page.pages {
        pager.push_str(&format!(
            "<a href=\"{}?page={}\">Next</a>",
            section.base_path(),
            current + 1,
        ));
    }

    let body = format!(
        "{toast}<h1>{title}</h1>\
         <form method=\"get\" action=\"{base}\">\
         <input type=\"search\" name=\"q\" value=\"{q}\" placeholder=\"Search\">\
         <button>Search</button>\
         </form>\
         <table><tbody>{rows}</tbody></table>\
         <p>{pager}</p>\
         <h2>Add new</h2>{form}\
         <p><a href=\"/dashboard\">Back to dashboard</a></p>",
        toast = html::toast(toast),
        title = section.title(),
        base = section.base_path(),
        q = html::escape(params.q.as_deref().unwrap_or("")),
        form = record_form(section, None, &FormFields::new(), &FieldErrors::new()),
    );
    html::page(section.title(), &body)
}

fn detail_page(section: Section, record: &Record, logs: &Page<Record>) -> String {
    let mut fields = FormFields::new();
    fields.insert("title".to_owned(), record.title.clone());
    fields.insert("description".to_owned(), record.description.clone());
    fields.insert("amount".to_owned(), record.amount.to_string());
    if let Some(attachment) = &record.attachment {
        fields.insert("attachment".to_owned(), attachment.clone());
    }

    let mut history = String::new();
    for log in &logs.items {
        history.push_str(&format!(
            "<li>{} ({:.2})</li>",
            html::escape(&log.title),
            log.amount,
        ));
    }
    if history.is_empty() {
        history.push_str("<li>No history yet.</li>");
    }

    let body = format!(
        "<h1>{title}</h1>\
         {form}\
         <form method=\"post\" action=\"{base}/{id}/delete\"><button>Delete</button></form>\
         <h2>History</h2><ul>{history}</ul>\
         <p><a href=\"{base}\">Back to {section_title}</a></p>",
        title = html::escape(&record.title),
        form = record_form(section, Some(record.id), &fields, &FieldErrors::new()),
        base = section.base_path(),
        id = record.id,
        section_title = section.title(),
    );
    html::page(&record.title, &body)
}
