//! Simulated Atlas library application.
//!
//! A hash-routed single page app rendered into `#app`. Every view renders
//! after `latency_ms` of tokio time, so scenarios only pass when they wait on
//! conditions. Buttons carry `data-action` / `data-kind` / `data-id` so the
//! behavior can route clicks without a real event system.

use sonda::memory::{Behavior, MemoryDocument, MemoryDriver, NodeId, NodeSpec, PageContext};
use sonda::{Dialog, InputKind, RecordKind, DEFAULT_BASE_URL, NAV_BUTTON_CLASS};
use std::sync::{Arc, Mutex};

// =============================================================================
// STORE
// =============================================================================

/// One persisted record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: u32,
    pub kind: RecordKind,
    pub fields: Vec<(&'static str, String)>,
}

impl StoredRecord {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
pub struct Store {
    pub records: Vec<StoredRecord>,
    next_id: u32,
    editing: Option<(RecordKind, u32)>,
    pending_delete: Option<(RecordKind, u32)>,
}

impl Store {
    pub fn insert(&mut self, kind: RecordKind, fields: Vec<(&'static str, String)>) -> u32 {
        self.next_id += 1;
        let id = self.next_id;
        self.records.push(StoredRecord { id, kind, fields });
        id
    }

    fn of_kind(&self, kind: RecordKind) -> Vec<StoredRecord> {
        self.records
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn names(&self, kind: RecordKind) -> Vec<String> {
        let field = name_field(kind);
        self.records
            .iter()
            .filter(|r| r.kind == kind)
            .filter_map(|r| r.value(field).map(str::to_string))
            .collect()
    }
}

fn name_field(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Student => "nome",
        RecordKind::Author => "autorNome",
    }
}

fn list_columns(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Student => &["nome", "matricula", "email"],
        RecordKind::Author => &["autorNome", "autorNacionalidade"],
    }
}

fn noun(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Student => "Aluno",
        RecordKind::Author => "Autor",
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Knobs for misbehaving variants of the app
#[derive(Debug, Clone, Copy)]
pub struct AppOptions {
    /// Render latency of every view change
    pub latency_ms: u64,
    /// Ask for confirmation before deleting
    pub confirm_delete: bool,
    /// Save submitted edits
    pub persist_edits: bool,
    /// Save an edit as a new record and keep the old one
    pub duplicate_edits: bool,
    /// Show an error first and replace it with success this much later
    pub late_success_ms: Option<u64>,
    /// Start with a few unrelated records per kind
    pub seed: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            latency_ms: 250,
            confirm_delete: true,
            persist_edits: true,
            duplicate_edits: false,
            late_success_ms: None,
            seed: true,
        }
    }
}

// =============================================================================
// APP
// =============================================================================

#[derive(Debug, Clone)]
enum View {
    Home,
    Create(RecordKind),
    List(RecordKind),
}

/// The application; clones share one store
#[derive(Debug, Clone)]
pub struct AtlasApp {
    store: Arc<Mutex<Store>>,
    options: AppOptions,
}

impl AtlasApp {
    pub fn new(options: AppOptions) -> Self {
        let mut store = Store::default();
        if options.seed {
            seed(&mut store);
        }
        Self {
            store: Arc::new(Mutex::new(store)),
            options,
        }
    }

    pub fn store(&self) -> Arc<Mutex<Store>> {
        Arc::clone(&self.store)
    }

    /// Fresh driver showing this app
    pub fn driver(&self) -> MemoryDriver {
        MemoryDriver::with_behavior(self.clone())
    }

    /// URL of a route under the default base URL
    pub fn url(route: &str) -> String {
        format!("{DEFAULT_BASE_URL}{route}")
    }

    fn view_for(route: &str) -> View {
        for kind in RecordKind::ALL {
            let bindings = kind.bindings();
            if route == bindings.create_route {
                return View::Create(kind);
            }
            if route == bindings.list_route {
                return View::List(kind);
            }
        }
        View::Home
    }

    fn show(&self, view: View, page: &mut PageContext<'_>) {
        let Ok(store) = self.store.lock() else {
            return;
        };
        let counts = (
            store.of_kind(RecordKind::Student).len(),
            store.of_kind(RecordKind::Author).len(),
        );
        let rows = match view {
            View::List(kind) => store.of_kind(kind),
            _ => Vec::new(),
        };
        drop(store);

        page.defer(self.options.latency_ms, move |doc| {
            let Some(app) = doc.find_by_id("app") else {
                return;
            };
            doc.clear_children(app);
            match view {
                View::Home => render_home(doc, app, counts),
                View::Create(kind) => render_create(doc, app, kind),
                View::List(kind) => render_list(doc, app, kind, &rows),
            }
        });
    }

    fn rerender_rows(&self, kind: RecordKind, page: &mut PageContext<'_>) {
        let Ok(store) = self.store.lock() else {
            return;
        };
        let rows = store.of_kind(kind);
        drop(store);
        let container = kind.bindings().list_container;
        page.defer(self.options.latency_ms, move |doc| {
            if let Some(tbody) = doc.find_by_id(container) {
                doc.clear_children(tbody);
                render_rows(doc, tbody, kind, &rows);
            }
        });
    }

    fn submit_create(&self, kind: RecordKind, page: &mut PageContext<'_>) {
        let fields: Vec<(&'static str, String)> = kind
            .schema()
            .iter()
            .map(|f| {
                let value = page
                    .document
                    .find_by_id(f.element_id)
                    .and_then(|n| page.document.value(n))
                    .unwrap_or_default()
                    .to_string();
                (f.name, value)
            })
            .collect();

        let complete = fields.iter().all(|(_, v)| !v.trim().is_empty());
        let message = if complete {
            if let Ok(mut store) = self.store.lock() {
                store.insert(kind, fields);
            }
            format!("{} cadastrado com sucesso!", noun(kind))
        } else {
            "Erro: preencha todos os campos obrigatórios.".to_string()
        };

        let region = kind.bindings().message_region;
        let (first, later) = match self.options.late_success_ms {
            Some(delay) if complete => (
                "Erro: matrícula já cadastrada".to_string(),
                Some((delay, message)),
            ),
            _ => (message, None),
        };
        page.defer(self.options.latency_ms, move |doc| {
            if let Some(node) = doc.find_by_id(region) {
                doc.set_text(node, first);
                doc.set_hidden(node, false);
            }
        });
        if let Some((delay, message)) = later {
            page.defer(self.options.latency_ms + delay, move |doc| {
                if let Some(node) = doc.find_by_id(region) {
                    doc.set_text(node, message);
                }
            });
        }
    }

    fn open_edit(&self, kind: RecordKind, id: u32, page: &mut PageContext<'_>) {
        let Ok(mut store) = self.store.lock() else {
            return;
        };
        let current = store
            .records
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.value(name_field(kind)))
            .unwrap_or_default()
            .to_string();
        store.editing = Some((kind, id));
        drop(store);

        let bindings = kind.bindings();
        let (modal, field) = (bindings.edit_modal, bindings.edit_field);
        page.defer(self.options.latency_ms, move |doc| {
            if let Some(input) = doc.find_by_id(field) {
                doc.set_value(input, current);
            }
            if let Some(node) = doc.find_by_id(modal) {
                doc.set_hidden(node, false);
            }
        });
    }

    fn save_edit(&self, kind: RecordKind, page: &mut PageContext<'_>) {
        let bindings = kind.bindings();
        let new_name = page
            .document
            .find_by_id(bindings.edit_field)
            .and_then(|n| page.document.value(n))
            .unwrap_or_default()
            .to_string();
        if let Ok(mut store) = self.store.lock() {
            if let Some((_, id)) = store.editing.take() {
                if self.options.duplicate_edits {
                    let field = name_field(kind);
                    let copy = store.records.iter().find(|r| r.id == id).map(|r| {
                        let mut fields = r.fields.clone();
                        if let Some(slot) = fields.iter_mut().find(|(n, _)| *n == field) {
                            slot.1 = new_name.clone();
                        }
                        fields
                    });
                    if let Some(fields) = copy {
                        store.insert(kind, fields);
                    }
                } else if self.options.persist_edits {
                    let field = name_field(kind);
                    if let Some(record) = store.records.iter_mut().find(|r| r.id == id) {
                        if let Some(slot) = record.fields.iter_mut().find(|(n, _)| *n == field) {
                            slot.1 = new_name;
                        }
                    }
                }
            }
        }

        let modal = bindings.edit_modal;
        page.defer(self.options.latency_ms, move |doc| {
            if let Some(node) = doc.find_by_id(modal) {
                doc.set_hidden(node, true);
            }
        });
        self.rerender_rows(kind, page);
    }

    fn delete(&self, kind: RecordKind, id: u32, page: &mut PageContext<'_>) {
        if self.options.confirm_delete {
            if let Ok(mut store) = self.store.lock() {
                store.pending_delete = Some((kind, id));
            }
            page.open_dialog(Dialog::confirm(format!(
                "Tem certeza que deseja excluir este {}?",
                noun(kind).to_lowercase()
            )));
            return;
        }
        self.remove(kind, id, page);
    }

    fn remove(&self, kind: RecordKind, id: u32, page: &mut PageContext<'_>) {
        if let Ok(mut store) = self.store.lock() {
            store.records.retain(|r| r.id != id);
        }
        self.rerender_rows(kind, page);
    }
}

impl Behavior for AtlasApp {
    fn navigate(&mut self, url: &str, page: &mut PageContext<'_>) {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        doc.append(root, NodeSpec::new("header").text("Atlas Biblioteca"));
        doc.append(root, NodeSpec::new("div").id("app"));
        page.reload(doc);

        let route = url.find('#').map_or("", |i| &url[i..]);
        self.show(Self::view_for(route), page);
    }

    fn click(&mut self, node: NodeId, page: &mut PageContext<'_>) {
        let doc = &*page.document;
        if doc.attr(node, "data-decoy").is_some() {
            return;
        }
        if let Some(href) = doc.attr(node, "href") {
            let view = Self::view_for(href);
            self.show(view, page);
            return;
        }
        let action = doc.attr(node, "data-action").map(str::to_string);
        let kind = doc
            .attr(node, "data-kind")
            .and_then(|k| k.parse::<RecordKind>().ok());
        let id = doc.attr(node, "data-id").and_then(|i| i.parse::<u32>().ok());

        match (action.as_deref(), kind, id) {
            (Some("create"), Some(kind), _) => self.submit_create(kind, page),
            (Some("edit"), Some(kind), Some(id)) => self.open_edit(kind, id, page),
            (Some("save-edit"), Some(kind), _) => self.save_edit(kind, page),
            (Some("delete"), Some(kind), Some(id)) => self.delete(kind, id, page),
            _ => {}
        }
    }

    fn dialog_closed(&mut self, _dialog: &Dialog, accepted: bool, page: &mut PageContext<'_>) {
        let pending = self
            .store
            .lock()
            .ok()
            .and_then(|mut store| store.pending_delete.take());
        if let (true, Some((kind, id))) = (accepted, pending) {
            self.remove(kind, id, page);
        }
    }
}

// =============================================================================
// VIEWS
// =============================================================================

fn seed(store: &mut Store) {
    for (nome, matricula, email) in [
        ("Maria Souza", "1001", "maria.souza@atlas.com.br"),
        ("Pedro Lima", "1002", "pedro.lima@atlas.com.br"),
    ] {
        store.insert(
            RecordKind::Student,
            vec![
                ("nome", nome.to_string()),
                ("matricula", matricula.to_string()),
                ("email", email.to_string()),
                ("telefone", "11912345678".to_string()),
                ("dataNascimento", "2001-03-04".to_string()),
            ],
        );
    }
    for (nome, nacionalidade) in [("Clarice Lispector", "Brasileira"), ("José Saramago", "Portuguesa")] {
        store.insert(
            RecordKind::Author,
            vec![
                ("autorNome", nome.to_string()),
                ("autorNacionalidade", nacionalidade.to_string()),
                ("autorNascimento", "1920-12-10".to_string()),
                ("autorBiografia", "Romancista.".to_string()),
            ],
        );
    }
}

fn render_home(doc: &mut MemoryDocument, app: NodeId, counts: (usize, usize)) {
    let stats = doc.append(app, NodeSpec::new("section").class("stats"));
    doc.append(
        stats,
        NodeSpec::new("span").id("stat-total-alunos").text(counts.0.to_string()),
    );
    doc.append(
        stats,
        NodeSpec::new("span").id("stat-total-autores").text(counts.1.to_string()),
    );

    let nav = doc.append(app, NodeSpec::new("nav"));
    for kind in RecordKind::ALL {
        let bindings = kind.bindings();
        // Same route without the button class; inert
        doc.append(
            nav,
            NodeSpec::new("a")
                .class("nav-text")
                .attr("href", bindings.create_route)
                .attr("data-decoy", "true")
                .text(format!("Sobre {}", noun(kind))),
        );
        doc.append(
            nav,
            NodeSpec::new("a")
                .class(NAV_BUTTON_CLASS)
                .attr("href", bindings.create_route)
                .text(format!("Cadastrar {}", noun(kind))),
        );
        doc.append(
            nav,
            NodeSpec::new("a")
                .class(NAV_BUTTON_CLASS)
                .attr("href", bindings.list_route)
                .text(format!("Consultar {}", noun(kind))),
        );
    }
}

fn render_create(doc: &mut MemoryDocument, app: NodeId, kind: RecordKind) {
    let bindings = kind.bindings();
    let form = doc.append(app, NodeSpec::new("form").id(bindings.create_form));
    for field in kind.schema() {
        let tag = match field.input {
            InputKind::LongText => "textarea",
            InputKind::Text | InputKind::Date => "input",
        };
        doc.append(form, NodeSpec::new("label").text(field.name));
        doc.append(
            form,
            NodeSpec::new(tag)
                .id(field.element_id)
                .attr("type", field.input.as_str())
                .value(""),
        );
    }
    doc.append(
        form,
        NodeSpec::new("button")
            .attr("type", "submit")
            .attr("data-action", "create")
            .attr("data-kind", kind.as_str())
            .text("Cadastrar"),
    );
    doc.append(
        app,
        NodeSpec::new("div").id(bindings.message_region).hidden(),
    );
}

fn render_list(doc: &mut MemoryDocument, app: NodeId, kind: RecordKind, rows: &[StoredRecord]) {
    let bindings = kind.bindings();
    let table = doc.append(app, NodeSpec::new("table").id(bindings.list_table));
    let thead = doc.append(table, NodeSpec::new("thead"));
    let header = doc.append(thead, NodeSpec::new("tr"));
    for column in list_columns(kind) {
        doc.append(header, NodeSpec::new("th").text(*column));
    }
    doc.append(header, NodeSpec::new("th").text("Ações"));
    let tbody = doc.append(table, NodeSpec::new("tbody").id(bindings.list_container));
    render_rows(doc, tbody, kind, rows);

    let modal = doc.append(app, NodeSpec::new("div").id(bindings.edit_modal).hidden());
    let form = doc.append(modal, NodeSpec::new("form").id(bindings.edit_form));
    doc.append(
        form,
        NodeSpec::new("input").id(bindings.edit_field).attr("type", "text").value(""),
    );
    doc.append(
        form,
        NodeSpec::new("button")
            .attr("type", "submit")
            .attr("data-action", "save-edit")
            .attr("data-kind", kind.as_str())
            .text("Salvar"),
    );
}

fn render_rows(doc: &mut MemoryDocument, tbody: NodeId, kind: RecordKind, rows: &[StoredRecord]) {
    let bindings = kind.bindings();
    for record in rows {
        let tr = doc.append(tbody, NodeSpec::new("tr"));
        for column in list_columns(kind) {
            doc.append(
                tr,
                NodeSpec::new("td").text(record.value(column).unwrap_or_default()),
            );
        }
        let actions = doc.append(tr, NodeSpec::new("td"));
        for (action, label) in [("edit", bindings.edit_label), ("delete", bindings.delete_label)] {
            doc.append(
                actions,
                NodeSpec::new("button")
                    .attr("data-action", action)
                    .attr("data-kind", kind.as_str())
                    .attr("data-id", record.id.to_string())
                    .text(label),
            );
        }
    }
}
