use askama::Template;

#[derive(Template)]
#[template(path = "sw.js", escape = "none")]
pub(crate) struct ServiceWorkerTemplate<'a> {
    pub(crate) icon: &'a str,
    pub(crate) snooze_path: &'a str,
    pub(crate) open_path: &'a str,
}
