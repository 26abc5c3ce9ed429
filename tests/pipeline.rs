use fisa_downloader::config::{self, Config, OutputConfig, SiteConfig};
use fisa_downloader::navigator::Navigator;
use fisa_downloader::types::Postback;
use fisa_downloader::{run, DownloadOutcome, DownloaderError, NavigationError, ProgressCallback, RunLayout, Semester};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF";

fn page(viewstate: &str, content: &str) -> String {
    format!(
        r#"<html><body>
        <form method="post" action="./Default.aspx" id="form1">
          <input type="hidden" name="__EVENTTARGET" value="" />
          <input type="hidden" name="__EVENTARGUMENT" value="" />
          <input type="hidden" name="__VIEWSTATE" value="{viewstate}" />
          <input type="hidden" name="__EVENTVALIDATION" value="ev-{viewstate}" />
          {content}
        </form></body></html>"#
    )
}

fn faculties_page() -> String {
    page(
        "root",
        r#"<table id="GridView1">
          <tr><td>MANAGEMENT</td><td><a href="javascript:__doPostBack('GridView1','plan$3')">Plan</a></td></tr>
          <tr><td>MARKETING</td><td><a href="javascript:__doPostBack('GridView1','plan$4')">Plan</a></td></tr>
        </table>"#,
    )
}

fn programs_page() -> String {
    page(
        "programs",
        r#"<table id="GridView1">
          <tr><td>Marketing</td><td>2024-2027</td><td>Învățământ la distanță</td>
              <td><a href="javascript:__doPostBack('GridView1','doi$1')">Anul II</a></td></tr>
          <tr><td>Marketing</td><td>2024-2027</td><td>Învățământ cu frecvență</td>
              <td><a href="javascript:__doPostBack('GridView1','unu$3')">Anul I</a></td>
              <td><a href="javascript:__doPostBack('GridView1','doi$3')">Anul II</a></td></tr>
        </table>"#,
    )
}

fn subject_row(name: &str, kind: &str, index: usize) -> String {
    format!(
        r#"<tr><td>{name}<br/>{name} (EN)</td><td>{kind}</td>
            <td><input type="image" onclick="javascript:__doPostBack('GridView2','ProgramaRO${index}');return false;" /></td>
            <td><input type="image" onclick="javascript:__doPostBack('GridView2','ProgramaEN${index}');return false;" /></td></tr>"#
    )
}

fn subjects_page(semester_one: &[&str], semester_two: &[&str]) -> String {
    let mut rows = String::from(r#"<tr><td colspan="4">Semestrul I</td></tr>"#);
    let mut index = 0;
    for name in semester_one {
        rows.push_str(&subject_row(name, "O", index));
        index += 1;
    }
    rows.push_str(r#"<tr><td colspan="4">Semestrul II</td></tr>"#);
    for name in semester_two {
        rows.push_str(&subject_row(name, "O", index));
        index += 1;
    }
    page("subjects", &format!(r#"<table id="GridView2">{rows}</table>"#))
}

async fn mount_navigation(server: &MockServer, subjects: String) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(faculties_page()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .and(body_string_contains("__EVENTARGUMENT=plan%244"))
        .respond_with(ResponseTemplate::new(200).set_body_string(programs_page()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .and(body_string_contains("__EVENTARGUMENT=doi%243"))
        .respond_with(ResponseTemplate::new(200).set_body_string(subjects))
        .mount(server)
        .await;
}

async fn mount_download(server: &MockServer, index: usize, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .and(body_string_contains(format!("__EVENTARGUMENT=ProgramaRO%24{index}&").as_str()))
        .respond_with(response)
        .mount(server)
        .await;
}

fn pdf_response() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/pdf")
        .set_body_bytes(PDF)
}

fn config_for(server: &MockServer, output: &Path) -> Config {
    let target = config::preset("marketing_year2").unwrap().validate().unwrap();
    let site = SiteConfig {
        base_url: format!("{}/", server.uri()),
        request_delay_ms: 0,
        ..SiteConfig::default()
    };
    Config::new(
        target,
        site,
        OutputConfig {
            dir: output.to_path_buf(),
        },
    )
    .unwrap()
}

async fn layout_for(config: &Config, output: &Path) -> RunLayout {
    RunLayout::prepare(output, &config.target.run_key()).await.unwrap()
}

#[tokio::test]
async fn downloads_subjects_into_semester_folders() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("referer", format!("{}/", server.uri()).as_str()))
        .and(header_exists("user-agent"))
        .and(header_exists("accept-language"))
        .respond_with(ResponseTemplate::new(200).set_body_string(faculties_page()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .and(body_string_contains("__EVENTTARGET=GridView1"))
        .and(body_string_contains("__EVENTARGUMENT=plan%244"))
        .and(body_string_contains("__VIEWSTATE=root"))
        .respond_with(ResponseTemplate::new(200).set_body_string(programs_page()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .and(body_string_contains("__EVENTARGUMENT=doi%243"))
        .and(body_string_contains("__VIEWSTATE=programs"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(subjects_page(&["Microeconomie"], &["Econometrie"])),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_download(&server, 0, pdf_response()).await;
    mount_download(&server, 1, pdf_response()).await;

    let config = config_for(&server, tmp.path());
    let layout = layout_for(&config, tmp.path()).await;
    let summary = run(&config, &layout, &CancellationToken::new(), None).await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.successful(), 2);
    assert!(!summary.cancelled);
    assert_eq!(summary.reports[0].subject.semester, Semester::First);
    assert_eq!(summary.reports[1].subject.semester, Semester::Second);

    let first = layout.semester_dir(Semester::First).join("Microeconomie.pdf");
    let second = layout.semester_dir(Semester::Second).join("Econometrie.pdf");
    assert_eq!(std::fs::read(&first).unwrap(), PDF);
    assert_eq!(std::fs::read(&second).unwrap(), PDF);
    assert!(layout.root.join("download_report.csv").exists());
}

#[tokio::test]
async fn duplicate_subject_is_downloaded_once() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_navigation(&server, subjects_page(&["Microeconomie", "MICROECONOMIE"], &[])).await;
    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .and(body_string_contains("ProgramaRO"))
        .respond_with(pdf_response())
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server, tmp.path());
    let layout = layout_for(&config, tmp.path()).await;
    let summary = run(&config, &layout, &CancellationToken::new(), None).await.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.reports[0].subject.name, "Microeconomie");
    assert_eq!(summary.reports[0].subject.argument, "ProgramaRO$0");
}

#[tokio::test]
async fn rejected_and_failed_downloads_do_not_stop_the_run() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_navigation(&server, subjects_page(&["Microeconomie", "Statistica", "Econometrie"], &[])).await;
    mount_download(
        &server,
        0,
        ResponseTemplate::new(200).set_body_string("<html><body>Sesiune expirata</body></html>"),
    )
    .await;
    mount_download(&server, 1, ResponseTemplate::new(500)).await;
    mount_download(&server, 2, pdf_response()).await;

    let config = config_for(&server, tmp.path());
    let layout = layout_for(&config, tmp.path()).await;
    let summary = run(&config, &layout, &CancellationToken::new(), None).await.unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.reports.len(), 3);
    assert_eq!(summary.reports[0].outcome, DownloadOutcome::RejectedNotPdf);
    assert_eq!(summary.reports[1].outcome, DownloadOutcome::HttpError(500));
    assert!(summary.reports[2].outcome.is_success());
    assert_eq!(summary.successful(), 1);
    assert_eq!(summary.failed(), 2);

    assert!(!layout.semester_dir(Semester::First).join("Microeconomie.pdf").exists());
    let rejected = std::fs::read_dir(&layout.snapshots)
        .unwrap()
        .filter_map(Result::ok)
        .any(|e| e.file_name().to_string_lossy().starts_with("rejected_1_Microeconomie"));
    assert!(rejected);
}

#[tokio::test]
async fn cancellation_stops_before_next_subject() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_navigation(&server, subjects_page(&["Alfa", "Beta", "Gama", "Delta", "Epsilon"], &[])).await;
    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .and(body_string_contains("ProgramaRO"))
        .respond_with(pdf_response())
        .expect(2)
        .mount(&server)
        .await;

    let config = config_for(&server, tmp.path());
    let layout = layout_for(&config, tmp.path()).await;

    let cancel = CancellationToken::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let progress: ProgressCallback = {
        let cancel = cancel.clone();
        let seen = Arc::clone(&seen);
        Arc::new(move |current, total| {
            seen.lock().unwrap().push((current, total));
            if current == 2 {
                cancel.cancel();
            }
        })
    };

    let summary = run(&config, &layout, &cancel, Some(progress)).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.total, 5);
    assert_eq!(summary.reports.len(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![(1, 5), (2, 5)]);
}

#[tokio::test]
async fn missing_faculty_lists_candidates() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_navigation(&server, subjects_page(&[], &[])).await;

    let mut config = config_for(&server, tmp.path());
    config.target.faculty_keywords = vec!["MEDICINA".into()];
    let layout = layout_for(&config, tmp.path()).await;

    let err = run(&config, &layout, &CancellationToken::new(), None).await.unwrap_err();
    match err {
        DownloaderError::Navigation(NavigationError::FacultyNotFound { candidates, .. }) => {
            assert_eq!(candidates, vec!["MANAGEMENT Plan".to_string(), "MARKETING Plan".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn subjects_page_without_obligatory_rows_is_an_error() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    let optional_only = page(
        "subjects",
        &format!(r#"<table id="GridView2">{}</table>"#, subject_row("Limba engleza", "A", 0)),
    );
    mount_navigation(&server, optional_only).await;

    let config = config_for(&server, tmp.path());
    let layout = layout_for(&config, tmp.path()).await;

    let err = run(&config, &layout, &CancellationToken::new(), None).await.unwrap_err();
    assert!(matches!(err, DownloaderError::ExtractionEmpty { buttons: 1 }));
}

#[tokio::test]
async fn non_ok_root_page_aborts_navigation() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let config = config_for(&server, tmp.path());
    let layout = layout_for(&config, tmp.path()).await;

    let err = run(&config, &layout, &CancellationToken::new(), None).await.unwrap_err();
    assert!(matches!(
        err,
        DownloaderError::Navigation(NavigationError::HttpStatus { step: "root", status: 503 })
    ));
    let snapshots = std::fs::read_dir(&layout.snapshots).unwrap().count();
    assert_eq!(snapshots, 1);
}

#[tokio::test]
async fn each_step_reports_the_link_it_followed() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    mount_navigation(&server, subjects_page(&["Microeconomie"], &[])).await;

    let config = config_for(&server, tmp.path());
    let navigator = Navigator::new(&config, None).unwrap();

    let root = navigator.load_root().await.unwrap();
    let faculty = navigator.select_faculty(&root).await.unwrap();
    assert_eq!(
        faculty.followed,
        Postback {
            target: "GridView1".into(),
            argument: "plan$4".into(),
        }
    );

    let subjects = navigator.select_program_year(&faculty.page).await.unwrap();
    assert_eq!(subjects.followed.argument, "doi$3");
    assert!(subjects.page.body.contains("ProgramaRO$0"));
}

#[tokio::test]
async fn page_without_form_aborts_navigation() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><table><tr><td>MARKETING</td>
               <td><a href="javascript:__doPostBack('GridView1','plan$4')">Plan</a></td></tr></table></body></html>"#,
        ))
        .mount(&server)
        .await;

    let config = config_for(&server, tmp.path());
    let layout = layout_for(&config, tmp.path()).await;

    let err = run(&config, &layout, &CancellationToken::new(), None).await.unwrap_err();
    assert!(matches!(
        err,
        DownloaderError::Navigation(NavigationError::NoForm { step: "root" })
    ));
}

#[tokio::test]
async fn transport_error_is_recorded_and_the_run_continues() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_navigation(&server, subjects_page(&["Alfa", "Beta"], &[])).await;
    mount_download(&server, 0, pdf_response().set_delay(Duration::from_secs(3))).await;
    mount_download(&server, 1, pdf_response()).await;

    let mut config = config_for(&server, tmp.path());
    config.site.timeout_secs = Some(1);
    let layout = layout_for(&config, tmp.path()).await;

    let summary = run(&config, &layout, &CancellationToken::new(), None).await.unwrap();

    assert_eq!(summary.reports.len(), 2);
    assert!(matches!(summary.reports[0].outcome, DownloadOutcome::Exception(_)));
    assert!(summary.reports[1].outcome.is_success());
    assert!(!layout.semester_dir(Semester::First).join("Alfa.pdf").exists());
    assert!(layout.semester_dir(Semester::First).join("Beta.pdf").exists());
}

#[tokio::test]
async fn non_ok_download_is_an_http_error_even_with_a_pdf_body() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_navigation(&server, subjects_page(&["Alfa"], &[])).await;
    mount_download(&server, 0, ResponseTemplate::new(404).set_body_bytes(PDF)).await;

    let config = config_for(&server, tmp.path());
    let layout = layout_for(&config, tmp.path()).await;

    let summary = run(&config, &layout, &CancellationToken::new(), None).await.unwrap();

    assert_eq!(summary.reports[0].outcome, DownloadOutcome::HttpError(404));
    assert!(!layout.semester_dir(Semester::First).join("Alfa.pdf").exists());
}
