//! Root page -> faculty -> program/year -> subjects page. Parsed documents
//! never live across an `.await`.

use log::{debug, info, warn};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

use crate::config::{Config, SiteConfig, Target};
use crate::error::{DownloaderError, NavigationError};
use crate::form::{self, FieldSet};
use crate::matcher::{match_faculty, match_program_year, ProgramQuery};
use crate::output::RunLayout;
use crate::parser::{count_buttons, rows};
use crate::types::{FormState, Page, Postback};

pub const STEP_ROOT: &str = "root";
pub const STEP_FACULTY: &str = "faculty_programs";
pub const STEP_SUBJECTS: &str = "subjects_page";

/// Cookie jar and browser-like headers shared by every request of one run.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    base_url: Url,
    form_selector: Option<Selector>,
}

impl Session {
    pub fn new(site: &SiteConfig) -> Result<Self, DownloaderError> {
        let base_url = site.base_url()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, header_value("site.accept_language", &site.accept_language)?);
        headers.insert(header::REFERER, header_value("site.base_url", base_url.as_str())?);
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let mut builder = Client::builder()
            .user_agent(site.user_agent.as_str())
            .default_headers(headers)
            .cookie_store(true);
        if let Some(secs) = site.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let form_selector = match &site.form_selector {
            Some(s) => Some(
                Selector::parse(s)
                    .map_err(|e| DownloaderError::config("site.form_selector", e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            client: builder.build()?,
            base_url,
            form_selector,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The page's postback form, hidden fields only.
    pub fn form_state(&self, document: &Html) -> Option<FormState> {
        match &self.form_selector {
            Some(selector) => form::extract_matching(document, selector, &self.base_url, FieldSet::Postback),
            None => form::extract(document, &self.base_url, FieldSet::Postback),
        }
    }

    pub async fn get(&self, url: &Url) -> Result<reqwest::Response, DownloaderError> {
        debug!("GET {}", url);
        Ok(self.client.get(url.as_str()).send().await?)
    }

    /// Submits `state` as `application/x-www-form-urlencoded`.
    pub async fn post(&self, state: &FormState) -> Result<reqwest::Response, DownloaderError> {
        debug!(
            "POST {} ({}={:?}, {}={:?})",
            state.action,
            crate::types::EVENT_TARGET,
            state.fields.get(crate::types::EVENT_TARGET),
            crate::types::EVENT_ARGUMENT,
            state.fields.get(crate::types::EVENT_ARGUMENT),
        );
        Ok(self
            .client
            .post(state.action.as_str())
            .form(&state.fields)
            .send()
            .await?)
    }
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue, DownloaderError> {
    HeaderValue::from_str(value).map_err(|e| DownloaderError::config(field, e.to_string()))
}

/// A navigation step's result: the page it reached and the link it followed.
#[derive(Debug, Clone)]
pub struct Step {
    pub page: Page,
    pub followed: Postback,
}

pub struct Navigator<'a> {
    session: Session,
    target: &'a Target,
    layout: Option<&'a RunLayout>,
}

impl<'a> Navigator<'a> {
    pub fn new(config: &'a Config, layout: Option<&'a RunLayout>) -> Result<Self, DownloaderError> {
        Ok(Self {
            session: Session::new(&config.site)?,
            target: &config.target,
            layout,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs all three steps and returns the subjects page.
    pub async fn navigate(&self) -> Result<Page, DownloaderError> {
        let root = self.load_root().await?;
        let faculty = self.select_faculty(&root).await?;
        let subjects = self.select_program_year(&faculty.page).await?;
        info!("Reached {} subjects page", self.target.target_year.label());
        Ok(subjects.page)
    }

    pub async fn load_root(&self) -> Result<Page, DownloaderError> {
        info!("Step 1: loading {}", self.session.base_url);
        let response = self.session.get(&self.session.base_url).await?;
        self.accept(STEP_ROOT, response).await
    }

    pub async fn select_faculty(&self, root: &Page) -> Result<Step, DownloaderError> {
        info!("Step 2: looking for faculty with keywords {:?}", self.target.faculty_keywords);
        let (state, followed) = {
            let document = Html::parse_document(&root.body);
            let state = self.require_form(&document, STEP_ROOT)?;
            let followed = match_faculty(&rows(&document), &self.target.faculty_keywords).map_err(|miss| {
                NavigationError::FacultyNotFound {
                    keywords: self.target.faculty_keywords.clone(),
                    candidates: miss.candidates,
                }
            })?;
            (state, followed)
        };

        let page = self.follow(STEP_FACULTY, &state, &followed).await?;
        Ok(Step { page, followed })
    }

    pub async fn select_program_year(&self, programs: &Page) -> Result<Step, DownloaderError> {
        info!(
            "Step 3: looking for {} ({}) {} {}",
            self.target.program_name,
            self.target.study_years,
            self.target.study_form.code(),
            self.target.target_year.label()
        );
        let query = ProgramQuery {
            program_name: &self.target.program_name,
            study_years: &self.target.study_years,
            study_form: self.target.study_form,
            target_year: self.target.target_year,
        };
        let (state, followed) = {
            let document = Html::parse_document(&programs.body);
            let state = self.require_form(&document, STEP_FACULTY)?;
            let followed = match_program_year(&rows(&document), &query).map_err(|miss| {
                NavigationError::ProgramNotFound {
                    program: self.target.program_name.clone(),
                    years: self.target.study_years.clone(),
                    candidates: miss.candidates,
                }
            })?;
            (state, followed)
        };

        let page = self.follow(STEP_SUBJECTS, &state, &followed).await?;

        let buttons = count_buttons(&Html::parse_document(&page.body), self.target.language.button_marker());
        if buttons == 0 {
            warn!("Subjects page has no {} download buttons", self.target.language.button_marker());
        } else {
            info!("Subjects page has {} download buttons", buttons);
        }

        Ok(Step { page, followed })
    }

    fn require_form(&self, document: &Html, step: &'static str) -> Result<FormState, NavigationError> {
        let state = self.session.form_state(document).ok_or(NavigationError::NoForm { step })?;
        debug!("Form action: {}", state.action);
        for (name, value) in &state.fields {
            debug!("  {}: {} bytes", name, value.len());
        }
        Ok(state)
    }

    async fn follow(
        &self,
        step: &'static str,
        state: &FormState,
        postback: &Postback,
    ) -> Result<Page, DownloaderError> {
        let response = self.session.post(&state.with_postback(postback)).await?;
        self.accept(step, response).await
    }

    async fn accept(&self, step: &'static str, response: reqwest::Response) -> Result<Page, DownloaderError> {
        let status = response.status();
        let body = response.text().await?;

        if let Some(layout) = self.layout {
            if let Some(path) = layout.save_snapshot(step, &body).await {
                debug!("Saved {} to {}", step, path.display());
            }
        }

        if status != StatusCode::OK {
            return Err(NavigationError::HttpStatus {
                step,
                status: status.as_u16(),
            }
            .into());
        }
        info!("Step '{}' loaded ({} bytes)", step, body.len());
        Ok(Page { body })
    }
}
