//! End-to-end conversion scenarios over the in-memory store and bus.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value as JsonValue;

use storebridge_core::{AggregateId, Money, TenantId, UserId};
use storebridge_crm::{Lead, LeadId, LeadKind, SalesTeamId};
use storebridge_events::{EventBus, EventEnvelope, InMemoryEventBus};
use storebridge_parties::{
    ClassifyPartner, ContactInfo, Partner, PartnerClassification, PartnerCommand, PartnerKind,
    PartyId, RegisterPartner,
};
use storebridge_payments::{AcquirerId, PaymentTransaction, TransactionId, TransactionState};
use storebridge_products::{CreateProduct, Product, ProductCommand, ProductId, UomId};
use storebridge_sales::{
    CarrierId, PaymentModeId, PaymentTermId, SalesOrder, SalesOrderId, SalesOrderStatus,
};
use storebridge_storefront::{
    ExternalAddress, ExternalCustomer, ExternalOrderData, ExternalOrderLine, ExternalProduct,
    ExternalSaleOrderCommand, ExternalSaleOrderId, ExternalShippingLine, ExternalSource,
    ExternalSourceId, ImportOrder, LandingAttribution, MapProduct, OrderTotals, ShopifyState,
    SourceKind, WooCommerceState,
};

use super::*;
use crate::config::{AreluxConfig, WorkflowConfig};
use crate::event_store::InMemoryEventStore;
use crate::read_model::InMemoryTenantStore;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Sources = Arc<InMemoryTenantStore<ExternalSourceId, ExternalSource>>;
type Workflow<X> = ExternalOrderWorkflow<InMemoryEventStore, Bus, Sources, X>;

const SOURCE_ID: ExternalSourceId = ExternalSourceId(1);

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn setup() -> Workflow<NoExtension> {
    let dispatcher = CommandDispatcher::new(InMemoryEventStore::new(), Arc::new(InMemoryEventBus::new()));
    ExternalOrderWorkflow::new(dispatcher, Arc::new(InMemoryTenantStore::new()), WorkflowConfig::default())
        .with_clock(fixed_now)
}

fn setup_arelux() -> Workflow<AreluxExtension> {
    setup().with_extension(AreluxExtension::new(AreluxConfig::default()))
}

/// Records every order of a scenario refers to.
struct Fixture {
    tenant_id: TenantId,
    customer: PartyId,
    billing: PartyId,
    shipping: PartyId,
    tile: ProductId,
    shipping_product: ProductId,
    salesperson: UserId,
}

fn register_partner<X: WorkflowExtension>(
    workflow: &Workflow<X>,
    tenant_id: TenantId,
    kind: PartnerKind,
    name: &str,
    vat: Option<&str>,
) -> PartyId {
    let party_id = PartyId::new(AggregateId::new());
    workflow
        .dispatcher()
        .dispatch(
            tenant_id,
            party_id.0,
            PARTNER_AGGREGATE,
            PartnerCommand::RegisterPartner(RegisterPartner {
                tenant_id,
                party_id,
                kind,
                name: name.to_string(),
                vat: vat.map(str::to_string),
                contact: Some(ContactInfo {
                    email: Some("ana@example.com".to_string()),
                    phone: Some("+34 600 000 000".to_string()),
                    ..ContactInfo::default()
                }),
                occurred_at: fixed_now(),
            }),
            |_, id| Partner::empty(PartyId::new(id)),
        )
        .unwrap();
    party_id
}

fn create_product<X: WorkflowExtension>(
    workflow: &Workflow<X>,
    tenant_id: TenantId,
    sku: &str,
    uom: Option<UomId>,
    weight_grams: u64,
) -> ProductId {
    let product_id = ProductId::new(AggregateId::new());
    workflow
        .dispatcher()
        .dispatch(
            tenant_id,
            product_id.0,
            PRODUCT_AGGREGATE,
            ProductCommand::CreateProduct(CreateProduct {
                tenant_id,
                product_id,
                sku: sku.to_string(),
                name: sku.to_lowercase(),
                uom,
                weight_grams,
                occurred_at: fixed_now(),
            }),
            |_, id| Product::empty(ProductId::new(id)),
        )
        .unwrap();
    product_id
}

fn fixture<X: WorkflowExtension>(
    workflow: &Workflow<X>,
    kind: SourceKind,
    customer_vat: Option<&str>,
) -> Fixture {
    let tenant_id = TenantId::new();
    let customer = register_partner(workflow, tenant_id, PartnerKind::Individual, "Ana Ruiz", customer_vat);
    let billing = register_partner(workflow, tenant_id, PartnerKind::Address, "Ana Ruiz (billing)", None);
    let shipping = register_partner(workflow, tenant_id, PartnerKind::Address, "Ana Ruiz (shipping)", None);
    let tile = create_product(workflow, tenant_id, "TILE-01", Some(UomId(7)), 2_500);
    let shipping_product = create_product(workflow, tenant_id, "SHIP", None, 0);
    let salesperson = UserId::new();

    let mut source = ExternalSource::new(SOURCE_ID, kind, "tiles.myshopify.com");
    source.salesperson = Some(salesperson);
    source.payment_mode = Some(PaymentModeId(2));
    source.payment_term = Some(PaymentTermId(1));
    source.shipping_product = Some(shipping_product);
    source.payment_acquirer = Some(AcquirerId(5));
    source.carrier = Some(CarrierId(3));
    workflow.sources().upsert(tenant_id, SOURCE_ID, source);

    Fixture {
        tenant_id,
        customer,
        billing,
        shipping,
        tile,
        shipping_product,
        salesperson,
    }
}

/// An order whose references are all mapped, `tiles` units of the tile product.
fn order_data(fx: &Fixture, kind: SourceKind, tiles: i64) -> ExternalOrderData {
    ExternalOrderData {
        external_id: "4501".to_string(),
        number: 1001,
        source_id: SOURCE_ID,
        source_kind: kind,
        date: fixed_now() - Duration::hours(2),
        currency: "EUR".to_string(),
        customer: Some(ExternalCustomer {
            external_id: "c-1".to_string(),
            email: Some("ana@example.com".to_string()),
            partner_id: Some(fx.customer),
        }),
        billing_address: Some(ExternalAddress {
            external_id: "a-1".to_string(),
            partner_id: Some(fx.billing),
        }),
        shipping_address: Some(ExternalAddress {
            external_id: "a-2".to_string(),
            partner_id: Some(fx.shipping),
        }),
        woocommerce_state: match kind {
            SourceKind::WooCommerce => WooCommerceState::Processing,
            SourceKind::Shopify => WooCommerceState::None,
        },
        shopify_state: match kind {
            SourceKind::WooCommerce => ShopifyState::None,
            SourceKind::Shopify => ShopifyState::Paid,
        },
        totals: OrderTotals {
            total_price: 12_100,
            subtotal_price: 10_000,
            total_tax: 2_100,
            total_discounts: 0,
            total_line_items_price: 10_000,
            total_shipping_price: 500,
        },
        lines: vec![ExternalOrderLine {
            title: "Ceramic tile".to_string(),
            quantity: tiles,
            unit_price_without_tax: 2_375,
            product: Some(ExternalProduct {
                external_id: "p-1".to_string(),
                product_id: Some(fx.tile),
            }),
            sales_line_no: None,
        }],
        shipping_lines: vec![ExternalShippingLine {
            title: "Standard shipping".to_string(),
            unit_price_without_tax: 500,
            sales_line_no: None,
        }],
        discounts: vec![],
        landing: LandingAttribution {
            url: Some("/tiles/ceramic".to_string()),
            utm_source: Some("newsletter".to_string()),
            ..LandingAttribution::default()
        },
    }
}

fn import<X: WorkflowExtension>(
    workflow: &Workflow<X>,
    tenant_id: TenantId,
    data: ExternalOrderData,
) -> ExternalSaleOrderId {
    let order_id = ExternalSaleOrderId::new(AggregateId::new());
    workflow
        .dispatcher()
        .dispatch(
            tenant_id,
            order_id.0,
            ORDER_AGGREGATE,
            ExternalSaleOrderCommand::ImportOrder(ImportOrder {
                tenant_id,
                order_id,
                data,
                occurred_at: fixed_now(),
            }),
            |_, id| ExternalSaleOrder::empty(ExternalSaleOrderId::new(id)),
        )
        .unwrap();
    order_id
}

fn lead<X: WorkflowExtension>(workflow: &Workflow<X>, tenant_id: TenantId, id: LeadId) -> Lead {
    workflow
        .dispatcher()
        .load(tenant_id, id.0, |_, id| Lead::empty(LeadId::new(id)))
        .unwrap()
        .unwrap()
}

fn sales_order<X: WorkflowExtension>(
    workflow: &Workflow<X>,
    tenant_id: TenantId,
    id: SalesOrderId,
) -> SalesOrder {
    workflow
        .dispatcher()
        .load(tenant_id, id.0, |_, id| SalesOrder::empty(SalesOrderId::new(id)))
        .unwrap()
        .unwrap()
}

fn transaction<X: WorkflowExtension>(
    workflow: &Workflow<X>,
    tenant_id: TenantId,
    id: TransactionId,
) -> PaymentTransaction {
    workflow
        .dispatcher()
        .load(tenant_id, id.0, |_, id| PaymentTransaction::empty(TransactionId::new(id)))
        .unwrap()
        .unwrap()
}

fn partner<X: WorkflowExtension>(workflow: &Workflow<X>, tenant_id: TenantId, id: PartyId) -> Partner {
    workflow
        .dispatcher()
        .load(tenant_id, id.0, |_, id| Partner::empty(PartyId::new(id)))
        .unwrap()
        .unwrap()
}

#[test]
fn paid_woocommerce_order_is_fully_converted() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 4));

    let report = workflow.run(fx.tenant_id, order_id).unwrap();

    assert!(report.allowed);
    assert_eq!(
        report.applied_steps(),
        vec![
            Step::CreateLead,
            Step::CreateSalesOrder,
            Step::ConfirmSalesOrder,
            Step::CreatePaymentTransaction,
            Step::WinLead
        ]
    );

    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    let lead_id = order.lead().unwrap();
    let sales_order_id = order.sales_order().unwrap();
    let transaction_id = order.payment_transaction().unwrap();

    let lead = lead(&workflow, fx.tenant_id, lead_id);
    assert_eq!(lead.kind(), LeadKind::Opportunity);
    assert_eq!(lead.name(), "woocommerce 1001");
    assert_eq!(lead.origin_ref(), Some(order_id.0));
    assert_eq!(lead.team(), Some(SalesTeamId(1)));
    assert_eq!(lead.salesperson(), Some(fx.salesperson));
    assert_eq!(lead.deadline(), Some(fixed_now() + Duration::days(1)));
    assert_eq!(lead.partner(), Some(fx.customer));
    assert_eq!(lead.contact_name(), Some("Ana Ruiz"));
    assert_eq!(lead.email(), Some("ana@example.com"));
    assert!(lead.is_won());
    assert_eq!(lead.probability(), 100);

    let so = sales_order(&workflow, fx.tenant_id, sales_order_id);
    let header = so.header().unwrap();
    assert_eq!(so.status(), SalesOrderStatus::Sale);
    assert_eq!(header.name, "SO1001");
    assert_eq!(header.origin.as_deref(), Some("woocommerce 1001"));
    assert_eq!(header.opportunity, Some(lead_id));
    assert_eq!(header.partner, fx.customer);
    assert_eq!(header.invoice_partner, fx.billing);
    assert_eq!(header.shipping_partner, fx.shipping);
    assert_eq!(header.salesperson, Some(fx.salesperson));
    assert_eq!(header.payment_mode, Some(PaymentModeId(2)));
    assert_eq!(header.payment_term, Some(PaymentTermId(1)));

    let lines = so.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].product_id, fx.shipping_product);
    assert_eq!(lines[0].quantity, 1);
    assert_eq!(lines[0].uom, UomId::UNIT);
    assert_eq!(lines[0].unit_price, 500);
    assert_eq!(lines[1].product_id, fx.tile);
    assert_eq!(lines[1].quantity, 4);
    assert_eq!(lines[1].uom, UomId(7));
    assert_eq!(lines[1].description, "Ceramic tile");
    assert!(lines.iter().all(|l| l.discount_percent == 0));

    let data = order.data().unwrap();
    assert_eq!(data.shipping_lines[0].sales_line_no, Some(lines[0].line_no));
    assert_eq!(data.lines[0].sales_line_no, Some(lines[1].line_no));

    let tx = transaction(&workflow, fx.tenant_id, transaction_id);
    assert_eq!(tx.state(), TransactionState::Done);
    assert_eq!(tx.reference(), "SO1001");
    assert_eq!(tx.sales_order(), Some(sales_order_id));
    assert_eq!(tx.amount(), Some(&Money::new(12_100, "EUR")));
    assert_eq!(tx.partner(), Some(fx.customer));
    assert_eq!(tx.acquirer(), Some(AcquirerId(5)));
    assert_eq!(tx.date_validate(), Some(data.date));

    assert_eq!(partner(&workflow, fx.tenant_id, fx.customer).salesperson(), Some(fx.salesperson));
}

#[test]
fn second_run_changes_nothing() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 4));
    workflow.run(fx.tenant_id, order_id).unwrap();
    let before = workflow.load_order(fx.tenant_id, order_id).unwrap();

    let subscription = workflow.dispatcher().bus().subscribe();
    let report = workflow.run(fx.tenant_id, order_id).unwrap();

    assert!(report.applied_steps().is_empty());
    assert_eq!(
        report.outcome(Step::ConfirmSalesOrder),
        Some(&StepOutcome::Skipped(SkipReason::NotAQuotation))
    );
    assert_eq!(
        report.outcome(Step::WinLead),
        Some(&StepOutcome::Skipped(SkipReason::AlreadyDone))
    );
    assert!(subscription.drain().is_empty());
    assert_eq!(workflow.load_order(fx.tenant_id, order_id).unwrap(), before);
}

#[test]
fn customer_without_tax_id_blocks_confirmation_only() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, None);
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 4));

    let report = workflow.run(fx.tenant_id, order_id).unwrap();

    assert_eq!(
        report.outcome(Step::ConfirmSalesOrder),
        Some(&StepOutcome::Rejected(
            "order SO1001 cannot be confirmed because the customer has no tax id".to_string()
        ))
    );
    assert_eq!(report.outcome(Step::CreatePaymentTransaction), Some(&StepOutcome::Applied));
    assert_eq!(
        report.outcome(Step::WinLead),
        Some(&StepOutcome::Skipped(SkipReason::NotConfirmed))
    );

    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    let so = sales_order(&workflow, fx.tenant_id, order.sales_order().unwrap());
    assert_eq!(so.status(), SalesOrderStatus::Draft);
    assert!(!lead(&workflow, fx.tenant_id, order.lead().unwrap()).is_won());
    assert!(order.payment_transaction().is_some());
}

#[test]
fn unmapped_product_defers_sales_order() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let mut data = order_data(&fx, SourceKind::WooCommerce, 4);
    data.lines[0].product = Some(ExternalProduct {
        external_id: "p-1".to_string(),
        product_id: None,
    });
    let order_id = import(&workflow, fx.tenant_id, data);

    let report = workflow.run(fx.tenant_id, order_id).unwrap();

    assert_eq!(report.applied_steps(), vec![Step::CreateLead]);
    assert_eq!(
        report.outcome(Step::CreateSalesOrder),
        Some(&StepOutcome::Skipped(SkipReason::ProductNotMapped))
    );
    assert_eq!(
        report.outcome(Step::CreatePaymentTransaction),
        Some(&StepOutcome::Skipped(SkipReason::NoSalesOrder))
    );
    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    assert!(order.lead().is_some());
    assert!(order.sales_order().is_none());

    workflow
        .dispatcher()
        .dispatch(
            fx.tenant_id,
            order_id.0,
            ORDER_AGGREGATE,
            ExternalSaleOrderCommand::MapProduct(MapProduct {
                tenant_id: fx.tenant_id,
                order_id,
                line_index: 0,
                product_id: fx.tile,
                occurred_at: fixed_now(),
            }),
            |_, id| ExternalSaleOrder::empty(ExternalSaleOrderId::new(id)),
        )
        .unwrap();

    let report = workflow.run_if_pending(fx.tenant_id, order_id).unwrap().unwrap();
    assert_eq!(
        report.outcome(Step::CreateLead),
        Some(&StepOutcome::Skipped(SkipReason::AlreadyDone))
    );
    assert_eq!(report.outcome(Step::CreateSalesOrder), Some(&StepOutcome::Applied));
    assert_eq!(report.outcome(Step::WinLead), Some(&StepOutcome::Applied));

    assert!(workflow.run_if_pending(fx.tenant_id, order_id).unwrap().is_none());
}

#[test]
fn unpaid_orders_are_left_alone() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let mut data = order_data(&fx, SourceKind::WooCommerce, 4);
    data.woocommerce_state = WooCommerceState::OnHold;
    let order_id = import(&workflow, fx.tenant_id, data);

    let report = workflow.run(fx.tenant_id, order_id).unwrap();

    assert!(!report.allowed);
    assert!(report.steps.is_empty());
    assert!(workflow.load_order(fx.tenant_id, order_id).unwrap().lead().is_none());
}

#[test]
fn order_without_configured_source_is_not_allowed() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 4));
    workflow.sources().clear_tenant(fx.tenant_id);

    assert!(!workflow.allow_create(fx.tenant_id, order_id).unwrap());
    assert!(!workflow.run(fx.tenant_id, order_id).unwrap().allowed);
}

#[test]
fn paid_shopify_order_is_converted() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::Shopify, Some("ESB12345678"));
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::Shopify, 4));

    let report = workflow.run(fx.tenant_id, order_id).unwrap();

    assert_eq!(report.applied_steps().len(), 5);
    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    assert_eq!(lead(&workflow, fx.tenant_id, order.lead().unwrap()).name(), "shopify 1001");
}

#[test]
fn missing_shipping_product_skips_shipping_lines() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let mut source = workflow.sources().get(fx.tenant_id, &SOURCE_ID).unwrap();
    source.shipping_product = None;
    workflow.sources().upsert(fx.tenant_id, SOURCE_ID, source);
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 4));

    workflow.run(fx.tenant_id, order_id).unwrap();

    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    let so = sales_order(&workflow, fx.tenant_id, order.sales_order().unwrap());
    assert_eq!(so.lines().len(), 1);
    assert_eq!(so.lines()[0].product_id, fx.tile);
    assert_eq!(order.data().unwrap().shipping_lines[0].sales_line_no, None);
}

#[test]
fn order_without_lines_is_still_confirmed_and_paid() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let mut data = order_data(&fx, SourceKind::WooCommerce, 4);
    data.lines.clear();
    data.shipping_lines.clear();
    let order_id = import(&workflow, fx.tenant_id, data);

    let report = workflow.run(fx.tenant_id, order_id).unwrap();

    assert_eq!(report.applied_steps().len(), 5);
    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    let so = sales_order(&workflow, fx.tenant_id, order.sales_order().unwrap());
    assert!(so.lines().is_empty());
    assert_eq!(so.status(), SalesOrderStatus::Sale);
    assert!(order.payment_transaction().is_some());
    assert!(lead(&workflow, fx.tenant_id, order.lead().unwrap()).is_won());

    let again = workflow.run(fx.tenant_id, order_id).unwrap();
    assert!(again.applied_steps().is_empty());
}

#[test]
fn unknown_partner_stops_the_run() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let mut data = order_data(&fx, SourceKind::WooCommerce, 4);
    let ghost = PartyId::new(AggregateId::new());
    if let Some(customer) = data.customer.as_mut() {
        customer.partner_id = Some(ghost);
    }
    let order_id = import(&workflow, fx.tenant_id, data);

    let err = workflow.run(fx.tenant_id, order_id).unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::MissingRecord { kind: "partner", id } if id == ghost.0
    ));
    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    assert!(order.lead().is_none());
    assert!(order.sales_order().is_none());
}

#[test]
fn orders_are_tenant_scoped() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 4));

    let err = workflow.run(TenantId::new(), order_id).unwrap_err();
    assert!(matches!(err, WorkflowError::OrderNotFound(id) if id == order_id));
}

#[test]
fn run_many_reports_each_order() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let pending = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 4));
    let mut data = order_data(&fx, SourceKind::WooCommerce, 2);
    data.woocommerce_state = WooCommerceState::Pending;
    let unpaid = import(&workflow, fx.tenant_id, data);
    let missing = ExternalSaleOrderId::new(AggregateId::new());

    let results = workflow.run_many(fx.tenant_id, &[pending, unpaid, missing]);

    assert_eq!(results.len(), 3);
    let converted = results[0].1.as_ref().unwrap().as_ref().unwrap();
    assert_eq!(converted.applied_steps().len(), 5);
    assert!(!results[1].1.as_ref().unwrap().as_ref().unwrap().allowed);
    assert!(matches!(results[2].1, Err(WorkflowError::OrderNotFound(_))));

    // Already converted orders are skipped on the next batch.
    let again = workflow.run_many(fx.tenant_id, &[pending]);
    assert!(again[0].1.as_ref().unwrap().is_none());
}

#[test]
fn payment_if_missing_records_payment_once() {
    let workflow = setup();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 4));
    workflow.create_lead(fx.tenant_id, order_id).unwrap();
    workflow.create_sales_order(fx.tenant_id, order_id).unwrap();

    assert_eq!(
        workflow
            .create_payment_transaction_if_missing(fx.tenant_id, order_id)
            .unwrap(),
        StepOutcome::Applied
    );
    assert_eq!(
        workflow
            .create_payment_transaction_if_missing(fx.tenant_id, order_id)
            .unwrap(),
        StepOutcome::Skipped(SkipReason::AlreadyDone)
    );
}

#[test]
fn arelux_copies_customer_classification() {
    let workflow = setup_arelux();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    workflow
        .dispatcher()
        .dispatch(
            fx.tenant_id,
            fx.customer.0,
            PARTNER_AGGREGATE,
            PartnerCommand::ClassifyPartner(ClassifyPartner {
                tenant_id: fx.tenant_id,
                party_id: fx.customer,
                classification: PartnerClassification {
                    activity_type: Some("installer".to_string()),
                    customer_type: None,
                },
                occurred_at: fixed_now(),
            }),
            |_, id| Partner::empty(PartyId::new(id)),
        )
        .unwrap();
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 4));

    workflow.create_lead(fx.tenant_id, order_id).unwrap();

    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    let classification = lead(&workflow, fx.tenant_id, order.lead().unwrap())
        .classification()
        .clone();
    assert_eq!(classification.activity_type.as_deref(), Some("installer"));
    assert_eq!(classification.customer_type, None);
}

#[test]
fn arelux_keeps_unclassified_customer_unclassified() {
    let workflow = setup_arelux();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 4));

    workflow.run(fx.tenant_id, order_id).unwrap();
    let subscription = workflow.dispatcher().bus().subscribe();
    workflow.run(fx.tenant_id, order_id).unwrap();

    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    let classification = lead(&workflow, fx.tenant_id, order.lead().unwrap())
        .classification()
        .clone();
    assert_eq!(classification.activity_type, None);
    assert_eq!(classification.customer_type, None);
    assert!(subscription.drain().is_empty());
}

#[test]
fn arelux_assigns_carrier_up_to_ten_kilos() {
    let workflow = setup_arelux();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    // 4 tiles of 2.5 kg: exactly at the threshold.
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 4));

    workflow.run(fx.tenant_id, order_id).unwrap();

    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    let so = sales_order(&workflow, fx.tenant_id, order.sales_order().unwrap());
    assert_eq!(so.carrier(), Some(CarrierId(3)));
    assert_eq!(so.status(), SalesOrderStatus::Sale);
}

#[test]
fn arelux_keeps_heavy_orders_without_carrier() {
    let workflow = setup_arelux();
    let fx = fixture(&workflow, SourceKind::WooCommerce, Some("ESB12345678"));
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 5));

    workflow.run(fx.tenant_id, order_id).unwrap();

    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    let so = sales_order(&workflow, fx.tenant_id, order.sales_order().unwrap());
    assert_eq!(so.carrier(), None);
}

#[test]
fn arelux_hook_runs_even_when_confirmation_is_rejected() {
    let workflow = setup_arelux();
    let fx = fixture(&workflow, SourceKind::WooCommerce, None);
    let order_id = import(&workflow, fx.tenant_id, order_data(&fx, SourceKind::WooCommerce, 1));

    let report = workflow.run(fx.tenant_id, order_id).unwrap();

    assert!(matches!(
        report.outcome(Step::ConfirmSalesOrder),
        Some(StepOutcome::Rejected(_))
    ));
    let order = workflow.load_order(fx.tenant_id, order_id).unwrap();
    let so = sales_order(&workflow, fx.tenant_id, order.sales_order().unwrap());
    assert_eq!(so.carrier(), Some(CarrierId(3)));
    assert_eq!(so.status(), SalesOrderStatus::Draft);
}
