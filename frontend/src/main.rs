use rust_decimal::Decimal;
use wasm_bindgen_futures::spawn_local;
use web_sys::InputEvent;
use yew::prelude::*;

mod api;
mod config;
mod error;
mod format;
mod model;
mod report;
mod session;
mod sync;

use config::ApiConfig;
use format::{format_currency, CURRENCY_SYMBOL};
use model::TotalPayload;
use report::Report;
use sync::SyncGuard;

const FETCH_ERROR_MESSAGE: &str = "Failed to fetch data. Please try again later.";
const HIDDEN_AMOUNT: &str = "••••••";

#[derive(Clone, Copy, PartialEq)]
enum View {
    Consolidado,
    Rubros,
    Subrubros,
    Cuentas,
}

impl View {
    fn title(self) -> &'static str {
        match self {
            View::Consolidado => "Informe Consolidado",
            View::Rubros => "Totales por Rubro",
            View::Subrubros => "Totales por Subrubro",
            View::Cuentas => "Totales por Cuenta",
        }
    }

    fn shows(self, table: View) -> bool {
        self == View::Consolidado || self == table
    }
}

#[derive(Properties, PartialEq)]
struct LayoutProps {
    children: Children,
    active_view: View,
    on_select: Callback<View>,
    query: String,
    on_search: Callback<String>,
}

#[function_component(Layout)]
fn layout(props: &LayoutProps) -> Html {
    html! {
        <div class="flex h-screen bg-background">
            <div class="hidden md:flex">
                <Sidebar active_view={props.active_view} on_select={props.on_select.clone()} />
            </div>

            <div class="flex-1 flex flex-col overflow-hidden">
                <Header query={props.query.clone()} on_search={props.on_search.clone()} />
                <main class="flex-1 overflow-y-auto">
                    { for props.children.iter() }
                </main>
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct HeaderProps {
    query: String,
    on_search: Callback<String>,
}

#[function_component(Header)]
fn header(props: &HeaderProps) -> Html {
    let oninput = {
        let on_search = props.on_search.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<web_sys::HtmlInputElement>() {
                on_search.emit(input.value());
            }
        })
    };

    html! {
        <header class="bg-[#D8E1E8] border-b border-border h-16 flex items-center justify-between px-6">
            <div class="flex items-center gap-2 w-full max-w-md bg-white rounded-full px-4 py-2 border border-border">
                { icon_search() }
                <input
                    type="search"
                    placeholder="Buscar año, rubro, código o regional"
                    value={props.query.clone()}
                    {oninput}
                    class="flex-1 bg-transparent text-sm focus:outline-none"
                />
            </div>
        </header>
    }
}

struct NavItem {
    label: &'static str,
    view: View,
    icon: fn() -> Html,
}

#[derive(Properties, PartialEq)]
struct SidebarProps {
    active_view: View,
    on_select: Callback<View>,
}

#[function_component(Sidebar)]
fn sidebar(props: &SidebarProps) -> Html {
    let nav_items = vec![
        NavItem {
            label: "Consolidado",
            view: View::Consolidado,
            icon: icon_layout_grid,
        },
        NavItem {
            label: "Rubros",
            view: View::Rubros,
            icon: icon_wallet,
        },
        NavItem {
            label: "Subrubros",
            view: View::Subrubros,
            icon: icon_bar_chart,
        },
        NavItem {
            label: "Cuentas",
            view: View::Cuentas,
            icon: icon_credit_card,
        },
    ];

    html! {
        <div class="w-[220px] h-screen bg-[#D8E1E8] p-4 flex flex-col">
            <div class="flex items-center gap-3 px-2 mb-8">
                <span class="text-[#173E63] text-2xl font-black tracking-tight">{"Informes"}</span>
            </div>

            <div class="flex-1 bg-[#173E63] rounded-[24px] flex flex-col py-6 px-3 shadow-lg">
                <nav class="flex-1 space-y-2">
                    { for nav_items.iter().map(|item| {
                        let is_active = item.view == props.active_view;
                        let class_name = if is_active {
                            "flex items-center gap-3 px-4 py-3 rounded-xl transition-all text-[13px] font-medium bg-[#B2CBDE] text-[#173E63] w-full"
                        } else {
                            "flex items-center gap-3 px-4 py-3 rounded-xl transition-all text-[13px] font-medium text-slate-300 hover:bg-white/5 hover:text-white w-full"
                        };
                        let on_select = props.on_select.clone();
                        let view = item.view;

                        html! {
                            <button type="button" class={class_name} onclick={Callback::from(move |_: MouseEvent| on_select.emit(view))}>
                                <span class="shrink-0">{ (item.icon)() }</span>
                                <span class="truncate whitespace-nowrap text-left">{ item.label }</span>
                            </button>
                        }
                    }) }
                </nav>
            </div>
        </div>
    }
}

fn page_shell(title: &'static str, actions: Html, children: Html) -> Html {
    html! {
        <div class="p-6 max-w-7xl mx-auto">
            <div class="flex items-center justify-between pb-4 border-b border-border">
                <h1 class="text-2xl font-bold text-foreground">{ title }</h1>
                { actions }
            </div>
            <div class="pt-5 space-y-6">
                { children }
            </div>
        </div>
    }
}

/// Handles a submission round reports back through.
#[derive(Clone)]
struct SyncHandles {
    guard: SyncGuard,
    running: UseStateHandle<bool>,
    status: UseStateHandle<Option<String>>,
}

/// Posts the report totals in the background and reports progress through
/// `status`. Unless `force` is set, totals already posted with the same value
/// are left alone. A call made while a round is still running is dropped.
fn spawn_sync(config: ApiConfig, payloads: Vec<TotalPayload>, force: bool, handles: SyncHandles) {
    let Some(ticket) = handles.guard.try_start() else {
        log::debug!("submission already running; ignoring request");
        return;
    };
    handles.running.set(true);

    spawn_local(async move {
        let mut ledger = session::load_ledger();
        let total = payloads.len();
        let pending = if force { payloads } else { ledger.pending(&payloads) };
        let unchanged = total - pending.len();

        let summary = if pending.is_empty() {
            format!("Totales al día ({} sin cambios)", unchanged)
        } else {
            handles
                .status
                .set(Some(format!("Guardando {} totales...", pending.len())));
            let mut outcome = api::save_totals(&config, pending, &mut ledger).await;
            outcome.unchanged = unchanged;
            session::save_ledger(&ledger);

            let summary = outcome.summary();
            if outcome.failed.is_empty() {
                log::info!("{}", summary);
            } else {
                log::warn!("{}", summary);
            }
            summary
        };

        drop(ticket);
        handles.running.set(false);
        handles.status.set(Some(summary));
    });
}

#[derive(Properties, PartialEq)]
struct InformePageProps {
    view: View,
    query: String,
}

#[function_component(InformePage)]
fn informe_page(props: &InformePageProps) -> Html {
    let config = use_context::<ApiConfig>().unwrap_or_default();

    let report = use_state(|| None::<Report>);
    let loading = use_state(|| true);
    let error = use_state(|| None::<String>);
    let visible = use_state(|| true);
    let sync_status = use_state(|| None::<String>);
    let syncing = use_state(|| false);
    let sync_guard = use_state(SyncGuard::default);
    // bumped once per successful load; the sync effect keys on it
    let loads = use_state(|| 0u32);

    let sync_handles = SyncHandles {
        guard: (*sync_guard).clone(),
        running: syncing.clone(),
        status: sync_status.clone(),
    };

    // fetch budget lines and reduce them
    {
        let config = config.clone();
        let report = report.clone();
        let loading = loading.clone();
        let error = error.clone();
        let loads = loads.clone();

        use_effect_with_deps(
            move |_| {
                spawn_local(async move {
                    match api::fetch_presupuestos(&config).await {
                        Ok(list) => match Report::from_response(&list) {
                            Ok(reduced) => {
                                if reduced.skipped > 0 {
                                    log::warn!("{} budget lines skipped", reduced.skipped);
                                }
                                report.set(Some(reduced));
                                loads.set(*loads + 1);
                            }
                            Err(msg) => error.set(Some(msg.to_string())),
                        },
                        Err(err) => {
                            log::error!("Error fetching data: {}", err);
                            error.set(Some(FETCH_ERROR_MESSAGE.to_string()));
                        }
                    }
                    loading.set(false);
                });
                || ()
            },
            (),
        );
    }

    // push totals once a report is available
    {
        let config = config.clone();
        let report = report.clone();
        let handles = sync_handles.clone();

        use_effect_with_deps(
            move |loads: &u32| {
                if *loads > 0 {
                    if let Some(report) = &*report {
                        if !report.is_empty() {
                            spawn_sync(config, report.payloads(), false, handles);
                        }
                    }
                }
                || ()
            },
            *loads,
        );
    }

    let on_toggle = {
        let visible = visible.clone();
        Callback::from(move |_: MouseEvent| visible.set(!*visible))
    };

    let on_force_sync = {
        let config = config.clone();
        let report = report.clone();
        let handles = sync_handles.clone();
        Callback::from(move |_: MouseEvent| {
            if let Some(report) = &*report {
                spawn_sync(config.clone(), report.payloads(), true, handles.clone());
            }
        })
    };

    let actions = html! {
        <div class="flex items-center gap-2">
            <button type="button" onclick={on_toggle} class="p-2 hover:bg-secondary rounded-full transition-colors" aria-label="Mostrar u ocultar totales">
                { if *visible { icon_eye_off() } else { icon_eye() } }
            </button>
            <button type="button" onclick={on_force_sync} disabled={report.is_none() || *syncing} class="flex items-center gap-2 bg-primary text-primary-foreground px-4 py-2 rounded-lg text-sm">
                { icon_refresh() }
                <span>{"Guardar totales"}</span>
            </button>
        </div>
    };

    let body = if *loading {
        html! { <p class="text-sm text-muted-foreground">{"Cargando..."}</p> }
    } else if let Some(msg) = &*error {
        html! { <p class="text-sm text-red-500">{ msg.clone() }</p> }
    } else if let Some(report) = &*report {
        html! {
            <>
                { report_body(report, props.view, &props.query, *visible) }
                {
                    if let Some(status) = &*sync_status {
                        html! { <p class="text-xs text-muted-foreground">{ status.clone() }</p> }
                    } else {
                        html! {}
                    }
                }
            </>
        }
    } else {
        html! {}
    };

    html! {
        { page_shell(props.view.title(), actions, body) }
    }
}

fn shown_amount(total: Decimal, visible: bool) -> String {
    if visible {
        format_currency(total, CURRENCY_SYMBOL)
    } else {
        HIDDEN_AMOUNT.to_string()
    }
}

fn report_body(report: &Report, view: View, query: &str, visible: bool) -> Html {
    let yearly = report.totals_by_year();

    let rubros = if view.shows(View::Rubros) {
        let rows = report
            .rubro_rows(query)
            .into_iter()
            .map(|row| {
                html! {
                    <tr key={format!("{}-{}", row.year, row.nombre)} class="text-sm hover:bg-muted/30 transition-colors">
                        <td class="px-6 py-3 text-muted-foreground">{ row.year.to_string() }</td>
                        <td class="px-6 py-3 text-foreground">{ row.nombre }</td>
                        <td class="px-6 py-3 text-right font-semibold text-foreground">{ shown_amount(row.total, visible) }</td>
                    </tr>
                }
            })
            .collect();
        report_table("Totales por Rubro", &["Año", "Rubro", "Total"], rows)
    } else {
        html! {}
    };

    let subrubros = if view.shows(View::Subrubros) {
        let rows = report
            .subrubro_rows(query)
            .into_iter()
            .map(|row| {
                html! {
                    <tr key={format!("{}-{}", row.year, row.codigo)} class="text-sm hover:bg-muted/30 transition-colors">
                        <td class="px-6 py-3 text-muted-foreground">{ row.year.to_string() }</td>
                        <td class="px-6 py-3 text-foreground">{ row.nombre }</td>
                        <td class="px-6 py-3 text-right font-semibold text-foreground">{ shown_amount(row.total, visible) }</td>
                    </tr>
                }
            })
            .collect();
        report_table("Totales por Subrubro", &["Año", "Subrubro", "Total"], rows)
    } else {
        html! {}
    };

    let cuentas = if view.shows(View::Cuentas) {
        let rows = report
            .cuenta_rows(query)
            .into_iter()
            .map(|row| {
                html! {
                    <tr key={format!("{}-{}", row.year, row.codigo)} class="text-sm hover:bg-muted/30 transition-colors">
                        <td class="px-6 py-3 text-muted-foreground">{ row.year.to_string() }</td>
                        <td class="px-6 py-3 text-foreground">{ row.codigo }</td>
                        <td class="px-6 py-3 text-foreground">{ row.nombre }</td>
                        <td class="px-6 py-3 text-foreground">{ row.regional }</td>
                        <td class="px-6 py-3 text-right font-semibold text-foreground">{ shown_amount(row.total, visible) }</td>
                    </tr>
                }
            })
            .collect();
        report_table(
            "Totales por Cuenta",
            &["Año", "Cuenta", "Nombre", "Regional", "Total"],
            rows,
        )
    } else {
        html! {}
    };

    html! {
        <>
            <div class="grid grid-cols-1 md:grid-cols-3 gap-6">
                { for yearly.iter().map(|(year, total)| html! {
                    <StatCard key={year.to_string()} title={format!("PRESUPUESTO {}", year)} amount={*total} visible={visible} />
                }) }
            </div>
            <p class="text-xs text-muted-foreground">
                { format!("{} rubros en catálogo", report.catalog.len()) }
                {
                    if report.skipped > 0 {
                        format!(" · {} registros sin fecha válida", report.skipped)
                    } else {
                        String::new()
                    }
                }
            </p>
            { rubros }
            { subrubros }
            { cuentas }
        </>
    }
}

fn report_table(title: &'static str, headers: &[&'static str], rows: Vec<Html>) -> Html {
    let colspan = headers.len().to_string();
    html! {
        <div class="bg-card rounded-lg border border-border overflow-hidden">
            <div class="px-6 py-4 border-b border-border">
                <h3 class="text-lg font-bold text-foreground">{ title }</h3>
            </div>
            <div class="overflow-x-auto">
                <table class="w-full text-left border-collapse">
                    <thead class="bg-secondary border-b border-border">
                        <tr>
                            { for headers.iter().map(|h| html! {
                                <th class="px-6 py-3 text-left text-sm font-semibold text-secondary-foreground">{ *h }</th>
                            }) }
                        </tr>
                    </thead>
                    <tbody class="divide-y divide-border">
                        { if rows.is_empty() {
                            html! { <tr><td colspan={colspan} class="px-6 py-6 text-center text-muted-foreground">{"Sin resultados."}</td></tr> }
                        } else {
                            html! { <>{ for rows.into_iter() }</> }
                        }}
                    </tbody>
                </table>
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct StatCardProps {
    title: String,
    amount: Decimal,
    visible: bool,
}

#[function_component(StatCard)]
fn stat_card(props: &StatCardProps) -> Html {
    html! {
        <div class="bg-card p-6 rounded-[10px] shadow-sm border border-border flex justify-between items-start">
            <div>
                <p class="text-muted-foreground text-[10px] font-bold mb-1 tracking-widest">{ props.title.clone() }</p>
                <h3 class="text-2xl font-bold text-[#1D617A] tracking-tight">{ shown_amount(props.amount, props.visible) }</h3>
            </div>
            <div class="p-3 bg-[#eef4f9] rounded-[10px]">
                { icon_wallet() }
            </div>
        </div>
    }
}

#[function_component(App)]
fn app() -> Html {
    let config = use_state(ApiConfig::load);
    let active_view = use_state(|| View::Consolidado);
    let query = use_state(String::new);

    let on_select = {
        let active_view = active_view.clone();
        Callback::from(move |view: View| active_view.set(view))
    };
    let on_search = {
        let query = query.clone();
        Callback::from(move |q: String| query.set(q))
    };

    html! {
        <ContextProvider<ApiConfig> context={(*config).clone()}>
            <Layout active_view={*active_view} on_select={on_select} query={(*query).clone()} on_search={on_search}>
                <InformePage view={*active_view} query={(*query).clone()} />
            </Layout>
        </ContextProvider<ApiConfig>>
    }
}

fn icon_base(path: &'static str) -> Html {
    html! {
        <svg width="20" height="20" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" class="text-foreground">
            <path d={path}></path>
        </svg>
    }
}

fn icon_layout_grid() -> Html {
    icon_base("M3 3h8v8H3zM13 3h8v8h-8zM3 13h8v8H3zM13 13h8v8h-8z")
}
fn icon_wallet() -> Html {
    icon_base("M3 7h18v10H3zM16 7V5H5v2")
}
fn icon_credit_card() -> Html {
    icon_base("M3 7h18v10H3zM3 11h18")
}
fn icon_bar_chart() -> Html {
    icon_base("M4 20V10M10 20V4M16 20v-6M22 20H2")
}
fn icon_search() -> Html {
    icon_base("M11 19a8 8 0 100-16 8 8 0 000 16zM21 21l-4.35-4.35")
}
fn icon_eye() -> Html {
    icon_base("M1 12s4-8 11-8 11 8 11 8-4 8-11 8-11-8-11-8zM12 15a3 3 0 100-6 3 3 0 000 6z")
}
fn icon_eye_off() -> Html {
    icon_base("M17.94 17.94A10.07 10.07 0 0112 20c-7 0-11-8-11-8a18.45 18.45 0 015.06-5.94M9.9 4.24A9.12 9.12 0 0112 4c7 0 11 8 11 8a18.5 18.5 0 01-2.16 3.19M1 1l22 22")
}
fn icon_refresh() -> Html {
    icon_base("M23 4v6h-6M1 20v-6h6M3.51 9a9 9 0 0114.85-3.36L23 10M1 14l4.64 4.36A9 9 0 0020.49 15")
}

fn main() {
    console_error_panic_hook::set_once();
    let level = if cfg!(debug_assertions) {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    wasm_logger::init(wasm_logger::Config::new(level));
    yew::Renderer::<App>::new().render();
}
