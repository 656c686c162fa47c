//! Integration Tests - Use Cases over Mocked and In-memory Stores
//!
//! Mocked ports (mockall) cover race and failure paths the in-memory store
//! cannot produce; `MemoryStore` covers the end-to-end workflows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use mockall::mock;
use rust_decimal_macros::dec;
use uuid::Uuid;

use cycle_market_engine::adapters::persistence::MemoryStore;
use cycle_market_engine::domain::basket::{Basket, BasketItem, SystemBasket};
use cycle_market_engine::domain::cycle::{
    Activation, Cycle, CycleStatus, DeliveryWindow, TimeWindow,
};
use cycle_market_engine::domain::error::DomainError;
use cycle_market_engine::domain::gate::ReleaseDenial;
use cycle_market_engine::domain::ids::{
    ConsumerId, ConsumerOrderId, ConsumerOrderItemId, CycleId, MarketId, OfferId, OfferItemId,
    ProductId, SupplierId,
};
use cycle_market_engine::domain::lifecycle::{ClosedReason, Transition};
use cycle_market_engine::domain::market::{CompositionStatus, Market, SaleType};
use cycle_market_engine::domain::offer::{Offer, OfferItem, OfferLine, Product, SupplierOrder};
use cycle_market_engine::domain::order::{ConsumerOrder, ConsumerOrderItem, OrderState};
use cycle_market_engine::domain::ranking::OfferHistoryEntry;
use cycle_market_engine::error::EngineError;
use cycle_market_engine::ports::repository::{
    BasketRepository, CompositionRepository, CycleDependents, CycleRepository, OfferRepository,
    OrderRepository, ProductRepository, RepoError, RepoResult,
};
use cycle_market_engine::usecases::{
    ensure_system_baskets, BasketCompositionEngine, BasketRequest, ConsumerOrderFinalizer,
    ItemStatus, MarketCoordinator, OfferAggregator, OrderConsolidator,
};

// ---- Mock Definitions ----

mock! {
    pub Ledger {}

    #[async_trait::async_trait]
    impl CycleRepository for Ledger {
        async fn load_cycle(&self, cycle_id: CycleId) -> RepoResult<Option<Cycle>>;
        async fn list_cycles(&self) -> RepoResult<Vec<Cycle>>;
        async fn insert_cycle(&self, cycle: &Cycle) -> RepoResult<()>;
        async fn update_cycle(&self, cycle: &Cycle) -> RepoResult<()>;
        async fn set_cycle_status(&self, cycle_id: CycleId, status: CycleStatus) -> RepoResult<()>;
        async fn delete_cycle(&self, cycle_id: CycleId) -> RepoResult<()>;
        async fn dependents(&self, cycle_id: CycleId) -> RepoResult<CycleDependents>;
        async fn insert_market(&self, market: &Market) -> RepoResult<()>;
        async fn set_market_status(&self, market_id: MarketId, status: CompositionStatus)
            -> RepoResult<()>;
        async fn replace_delivery_windows(&self, cycle_id: CycleId, windows: &[DeliveryWindow])
            -> RepoResult<()>;
        async fn list_delivery_windows(&self, cycle_id: CycleId)
            -> RepoResult<Vec<DeliveryWindow>>;
    }

    #[async_trait::async_trait]
    impl OfferRepository for Ledger {
        async fn find_offer(&self, cycle_id: CycleId, supplier_id: SupplierId)
            -> RepoResult<Option<Offer>>;
        async fn get_offer(&self, offer_id: OfferId) -> RepoResult<Option<Offer>>;
        async fn insert_offer(&self, offer: &Offer) -> RepoResult<()>;
        async fn find_offer_item(&self, offer_id: OfferId, product_id: ProductId)
            -> RepoResult<Option<OfferItem>>;
        async fn insert_offer_item(&self, item: &OfferItem) -> RepoResult<()>;
        async fn set_offer_item_quantity(&self, item_id: OfferItemId, quantity: u32)
            -> RepoResult<()>;
        async fn list_offer_items(&self, offer_id: OfferId) -> RepoResult<Vec<OfferItem>>;
        async fn delete_empty_offer_items(&self, offer_id: OfferId) -> RepoResult<usize>;
        async fn list_offer_lines(&self, cycle_id: CycleId) -> RepoResult<Vec<OfferLine>>;
        async fn supplier_offer_history(&self, supplier_id: SupplierId)
            -> RepoResult<Vec<OfferHistoryEntry>>;
        async fn replace_supplier_orders(&self, cycle_id: CycleId, orders: &[SupplierOrder])
            -> RepoResult<()>;
        async fn list_supplier_orders(&self, cycle_id: CycleId) -> RepoResult<Vec<SupplierOrder>>;
    }

    #[async_trait::async_trait]
    impl ProductRepository for Ledger {
        async fn get_product(&self, product_id: ProductId) -> RepoResult<Option<Product>>;
        async fn insert_product(&self, product: &Product) -> RepoResult<()>;
        async fn list_supplier_products(&self, supplier_id: SupplierId)
            -> RepoResult<Vec<Product>>;
    }

    #[async_trait::async_trait]
    impl OrderRepository for Ledger {
        async fn find_consumer_order(&self, cycle_id: CycleId, consumer_id: ConsumerId)
            -> RepoResult<Option<ConsumerOrder>>;
        async fn get_consumer_order(&self, order_id: ConsumerOrderId)
            -> RepoResult<Option<ConsumerOrder>>;
        async fn insert_consumer_order(&self, order: &ConsumerOrder) -> RepoResult<()>;
        async fn set_consumer_order_status(&self, order_id: ConsumerOrderId, status: &str)
            -> RepoResult<()>;
        async fn find_order_item(&self, order_id: ConsumerOrderId, product_id: ProductId)
            -> RepoResult<Option<ConsumerOrderItem>>;
        async fn insert_order_item(&self, item: &ConsumerOrderItem) -> RepoResult<()>;
        async fn set_order_item_quantity(&self, item_id: ConsumerOrderItemId, quantity: u32)
            -> RepoResult<()>;
        async fn list_order_items(&self, order_id: ConsumerOrderId)
            -> RepoResult<Vec<ConsumerOrderItem>>;
        async fn delete_empty_order_items(&self, order_id: ConsumerOrderId) -> RepoResult<usize>;
        async fn list_cycle_order_items(&self, cycle_id: CycleId)
            -> RepoResult<Vec<ConsumerOrderItem>>;
    }
}

fn storage_down() -> RepoError {
    RepoError::Storage(anyhow::anyhow!("connection reset"))
}

fn ledger_with_cycle() -> MockLedger {
    let mut repo = MockLedger::new();
    repo.expect_load_cycle()
        .returning(|_| Ok(Some(new_cycle(&[]))));
    repo
}

// ---- Mocked port tests ----

#[tokio::test]
async fn test_offer_insert_conflict_rereads_winner() {
    let (cycle_id, supplier_id) = (Uuid::new_v4(), Uuid::new_v4());
    let winner = Offer::new(cycle_id, supplier_id);
    let winner_id = winner.id;

    let lookups = AtomicUsize::new(0);
    let mut repo = ledger_with_cycle();
    repo.expect_find_offer().times(2).returning(move |_, _| {
        if lookups.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(None)
        } else {
            Ok(Some(winner.clone()))
        }
    });
    repo.expect_insert_offer()
        .times(1)
        .returning(|offer| Err(RepoError::conflict("offer", offer.id)));

    let aggregator = OfferAggregator::new(Arc::new(repo));
    let offer = aggregator
        .find_or_create_offer(cycle_id, supplier_id)
        .await
        .unwrap();
    assert_eq!(offer.id, winner_id);
}

#[tokio::test]
async fn test_offer_lookup_storage_failure_is_not_not_found() {
    let mut repo = ledger_with_cycle();
    repo.expect_find_offer().returning(|_, _| Err(storage_down()));

    let aggregator = OfferAggregator::new(Arc::new(repo));
    let err = aggregator
        .find_or_create_offer(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();

    assert!(err.is_storage());
    assert!(!matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn test_offer_for_unknown_cycle_is_not_found() {
    // Only the cycle lookup is expected; an offer insert would panic.
    let mut repo = MockLedger::new();
    repo.expect_load_cycle().times(1).returning(|_| Ok(None));

    let aggregator = OfferAggregator::new(Arc::new(repo));
    let err = aggregator
        .find_or_create_offer(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "cycle", .. }));
}

#[tokio::test]
async fn test_consumer_order_for_unknown_cycle_is_not_found() {
    let mut repo = MockLedger::new();
    repo.expect_load_cycle().times(1).returning(|_| Ok(None));

    let consolidator = OrderConsolidator::new(Arc::new(repo));
    let err = consolidator
        .upsert_consumer_order(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "cycle", .. }));
}

#[tokio::test]
async fn test_order_item_for_unknown_product_is_not_found() {
    let mut repo = MockLedger::new();
    repo.expect_find_order_item().returning(|_, _| Ok(None));
    repo.expect_get_product().times(1).returning(|_| Ok(None));

    let consolidator = OrderConsolidator::new(Arc::new(repo));
    let err = consolidator
        .upsert_order_item(Uuid::new_v4(), Uuid::new_v4(), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "product", .. }));
}

#[tokio::test]
async fn test_ranking_degrades_when_history_fails() {
    let supplier_id = Uuid::new_v4();
    let products = vec![
        Product::new(supplier_id, "Tomate", dec!(4.50)),
        Product::new(supplier_id, "Alface", dec!(2.00)),
    ];

    let mut repo = MockLedger::new();
    repo.expect_list_supplier_products()
        .returning(move |_| Ok(products.clone()));
    repo.expect_supplier_offer_history()
        .returning(|_| Err(storage_down()));

    let aggregator = OfferAggregator::new(Arc::new(repo));
    let ranked = aggregator.most_offered_products(supplier_id).await.unwrap();

    let names: Vec<&str> = ranked.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Alface", "Tomate"]);
}

#[tokio::test]
async fn test_negative_order_quantity_never_reaches_store() {
    // No expectations: any repository call would panic.
    let consolidator = OrderConsolidator::new(Arc::new(MockLedger::new()));
    let err = consolidator
        .upsert_order_item(Uuid::new_v4(), Uuid::new_v4(), -3)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationRejected(_)));
}

#[tokio::test]
async fn test_order_item_conflict_overwrites_winner() {
    let (order_id, product_id) = (Uuid::new_v4(), Uuid::new_v4());
    let winner = ConsumerOrderItem::new(order_id, product_id, 2);
    let winner_id = winner.id;

    let lookups = AtomicUsize::new(0);
    let mut repo = MockLedger::new();
    repo.expect_find_order_item().times(2).returning(move |_, _| {
        if lookups.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(None)
        } else {
            Ok(Some(winner.clone()))
        }
    });
    repo.expect_get_product()
        .returning(|id| {
            let mut product = Product::new(Uuid::new_v4(), "Mel", dec!(25.00));
            product.id = id;
            Ok(Some(product))
        });
    repo.expect_get_consumer_order()
        .returning(move |_| Ok(Some(ConsumerOrder::new(Uuid::new_v4(), Uuid::new_v4()))));
    repo.expect_insert_order_item()
        .returning(|item| Err(RepoError::conflict("order item", item.id)));
    repo.expect_set_order_item_quantity()
        .withf(move |id, qty| *id == winner_id && *qty == 7)
        .times(1)
        .returning(|_, _| Ok(()));

    let consolidator = OrderConsolidator::new(Arc::new(repo));
    let item = consolidator
        .upsert_order_item(order_id, product_id, 7)
        .await
        .unwrap();
    assert_eq!(item.id, winner_id);
    assert_eq!(item.quantity, 7);
}

#[tokio::test]
async fn test_sum_ordered_quantity_without_orders_is_zero() {
    let mut repo = MockLedger::new();
    repo.expect_list_cycle_order_items().returning(|_| Ok(vec![]));

    let consolidator = OrderConsolidator::new(Arc::new(repo));
    let total = consolidator
        .sum_ordered_quantity(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_is_finalized_propagates_storage_failure() {
    let mut repo = MockLedger::new();
    repo.expect_find_consumer_order()
        .returning(|_, _| Err(storage_down()));

    let consolidator = OrderConsolidator::new(Arc::new(repo));
    let err = consolidator
        .is_finalized(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(err.is_storage());
}

#[tokio::test]
async fn test_finalize_missing_order_is_not_found() {
    let mut repo = MockLedger::new();
    repo.expect_get_consumer_order().returning(|_| Ok(None));

    let finalizer = ConsumerOrderFinalizer::new(Arc::new(repo));
    let err = finalizer
        .finalize(Uuid::new_v4(), "finalizado")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "consumer order", .. }));
}

// ---- End-to-end over MemoryStore ----

fn window(from_hours: i64, to_hours: i64) -> TimeWindow {
    let now = Utc::now();
    TimeWindow::new(now + Duration::hours(from_hours), now + Duration::hours(to_hours))
}

fn new_cycle(markets: &[(SaleType, i32)]) -> Cycle {
    let mut cycle = Cycle::new(
        "Ciclo de teste",
        Uuid::new_v4(),
        window(-1, 24),
        window(24, 48),
        window(48, 72),
    );
    cycle.markets = markets
        .iter()
        .map(|(sale_type, ordem)| Market::new(cycle.id, *sale_type, *ordem))
        .collect();
    cycle
}

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    ensure_system_baskets(store.as_ref()).await.unwrap();
    store
}

#[tokio::test]
async fn test_find_or_create_offer_twice_returns_same_offer() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let aggregator = OfferAggregator::new(Arc::clone(&store));
    let cycle_id = coordinator.create_cycle(new_cycle(&[])).await.unwrap().id;
    let supplier_id = Uuid::new_v4();

    let first = aggregator.find_or_create_offer(cycle_id, supplier_id).await.unwrap();
    let second = aggregator.find_or_create_offer(cycle_id, supplier_id).await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn test_upsert_offer_item_keeps_one_row_with_last_quantity() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let aggregator = OfferAggregator::new(Arc::clone(&store));
    let cycle = coordinator.create_cycle(new_cycle(&[])).await.unwrap();
    let supplier_id = Uuid::new_v4();
    let product = Product::new(supplier_id, "Cenoura", dec!(3.20));
    store.insert_product(&product).await.unwrap();

    let offer = aggregator
        .find_or_create_offer(cycle.id, supplier_id)
        .await
        .unwrap();
    aggregator.upsert_offer_item(offer.id, product.id, 4).await.unwrap();
    aggregator.upsert_offer_item(offer.id, product.id, 9).await.unwrap();

    let items = store.list_offer_items(offer.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 9);
    assert_eq!(items[0].reference_price, dec!(3.20));
}

#[tokio::test]
async fn test_zero_offer_item_survives_until_pruned() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let aggregator = OfferAggregator::new(Arc::clone(&store));
    let cycle = coordinator.create_cycle(new_cycle(&[])).await.unwrap();
    let supplier_id = Uuid::new_v4();
    let product = Product::new(supplier_id, "Couve", dec!(1.80));
    store.insert_product(&product).await.unwrap();

    let offer = aggregator
        .find_or_create_offer(cycle.id, supplier_id)
        .await
        .unwrap();
    aggregator.upsert_offer_item(offer.id, product.id, 5).await.unwrap();
    aggregator.upsert_offer_item(offer.id, product.id, 0).await.unwrap();

    let item = store.find_offer_item(offer.id, product.id).await.unwrap().unwrap();
    assert_eq!(item.quantity, 0);

    assert_eq!(aggregator.prune_empty_offer_items(offer.id).await.unwrap(), 1);
    assert!(store.find_offer_item(offer.id, product.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_availability_and_supplier_orders() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let aggregator = OfferAggregator::new(Arc::clone(&store));
    let cycle_id = coordinator.create_cycle(new_cycle(&[])).await.unwrap().id;
    let (s1, s2) = (Uuid::new_v4(), Uuid::new_v4());
    let p1 = Product::new(s1, "Batata", dec!(5.00));
    let p2 = Product::new(s2, "Batata doce", dec!(6.00));
    store.insert_product(&p1).await.unwrap();
    store.insert_product(&p2).await.unwrap();

    let o1 = aggregator.find_or_create_offer(cycle_id, s1).await.unwrap();
    let o2 = aggregator.find_or_create_offer(cycle_id, s2).await.unwrap();
    aggregator.upsert_offer_item(o1.id, p1.id, 10).await.unwrap();
    aggregator.upsert_offer_item(o2.id, p1.id, 5).await.unwrap();
    aggregator.upsert_offer_item(o2.id, p2.id, 0).await.unwrap();

    let availability = aggregator.available_by_product(cycle_id).await.unwrap();
    assert_eq!(availability.len(), 1);
    assert_eq!(availability[0].product_id, p1.id);
    assert_eq!(availability[0].total_quantity, 15);
    assert_eq!(availability[0].suppliers.len(), 2);

    let orders = aggregator.derive_supplier_orders(cycle_id).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(store.list_supplier_orders(cycle_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_most_offered_products_ranks_by_history() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let aggregator = OfferAggregator::with_ranking_window(Arc::clone(&store), 5);
    let supplier_id = Uuid::new_v4();

    let rare = Product::new(supplier_id, "Abobrinha", dec!(3.00));
    let popular = Product::new(supplier_id, "Mandioca", dec!(4.00));
    let never = Product::new(supplier_id, "Alho", dec!(9.00));
    let mut gone = Product::new(supplier_id, "Agrião", dec!(2.00));
    gone.deleted = true;
    for p in [&rare, &popular, &never, &gone] {
        store.insert_product(p).await.unwrap();
    }

    let cycle = coordinator.create_cycle(new_cycle(&[])).await.unwrap();
    let offer = aggregator.find_or_create_offer(cycle.id, supplier_id).await.unwrap();
    aggregator.upsert_offer_item(offer.id, popular.id, 20).await.unwrap();
    aggregator.upsert_offer_item(offer.id, rare.id, 2).await.unwrap();
    aggregator.upsert_offer_item(offer.id, gone.id, 50).await.unwrap();

    let ranked = aggregator.most_offered_products(supplier_id).await.unwrap();
    let names: Vec<&str> = ranked.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Mandioca", "Abobrinha", "Alho"]);
}

#[tokio::test]
async fn test_ranking_ignores_cycle_still_in_oferta() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let aggregator = OfferAggregator::new(Arc::clone(&store));
    let supplier_id = Uuid::new_v4();

    let mel = Product::new(supplier_id, "Mel", dec!(25.00));
    let queijo = Product::new(supplier_id, "Queijo", dec!(30.00));
    store.insert_product(&mel).await.unwrap();
    store.insert_product(&queijo).await.unwrap();

    let past = coordinator.create_cycle(new_cycle(&[])).await.unwrap();
    let offer = aggregator.find_or_create_offer(past.id, supplier_id).await.unwrap();
    aggregator.upsert_offer_item(offer.id, queijo.id, 3).await.unwrap();

    let open = coordinator.create_cycle(new_cycle(&[])).await.unwrap();
    coordinator.transition_cycle(open.id, CycleStatus::Oferta).await.unwrap();
    let offer = aggregator.find_or_create_offer(open.id, supplier_id).await.unwrap();
    aggregator.upsert_offer_item(offer.id, mel.id, 40).await.unwrap();

    let ranked = aggregator.most_offered_products(supplier_id).await.unwrap();
    let names: Vec<&str> = ranked.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Queijo", "Mel"]);
}

#[tokio::test]
async fn test_compose_always_adds_system_baskets() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let engine = BasketCompositionEngine::new(Arc::clone(&store));
    let cycle = coordinator.create_cycle(new_cycle(&[])).await.unwrap();

    let report = engine.compose_for_cycle(cycle.id, &[]).await.unwrap();
    assert!(report.all_succeeded());

    for system in SystemBasket::ALL {
        let composition = store.find_composition(cycle.id, system.id()).await.unwrap().unwrap();
        assert_eq!(composition.quantity, 1);
    }
}

#[tokio::test]
async fn test_compose_rejects_bad_entries_and_keeps_going() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let engine = BasketCompositionEngine::new(Arc::clone(&store));
    let cycle = coordinator.create_cycle(new_cycle(&[])).await.unwrap();

    let small = Basket::new("Cesta pequena", dec!(60), vec![]);
    let large = Basket::new("Cesta grande", dec!(120), vec![]);
    store.insert_basket(&small).await.unwrap();
    store.insert_basket(&large).await.unwrap();
    let unknown = Uuid::new_v4();

    let report = engine
        .compose_for_cycle(
            cycle.id,
            &[
                BasketRequest { basket_id: small.id, quantity: 10 },
                BasketRequest { basket_id: large.id, quantity: -1 },
                BasketRequest { basket_id: unknown, quantity: 3 },
                BasketRequest { basket_id: SystemBasket::ExtraOrders.id(), quantity: 40 },
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.outcome(&small.id), Some(&ItemStatus::Created));
    assert!(matches!(report.outcome(&large.id), Some(ItemStatus::Rejected(_))));
    assert!(matches!(report.outcome(&unknown), Some(ItemStatus::Rejected(_))));
    assert_eq!(report.rejected, 3);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);

    let extra = store
        .find_composition(cycle.id, SystemBasket::ExtraOrders.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(extra.quantity, 1);
    assert!(store.find_composition(cycle.id, large.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_compose_unknown_cycle_is_not_found() {
    let store = seeded_store().await;
    let engine = BasketCompositionEngine::new(store);
    let err = engine.compose_for_cycle(Uuid::new_v4(), &[]).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "cycle", .. }));
}

#[tokio::test]
async fn test_compose_seeds_missing_system_baskets() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let engine = BasketCompositionEngine::new(Arc::clone(&store));
    let cycle = coordinator.create_cycle(new_cycle(&[])).await.unwrap();

    let report = engine.compose_for_cycle(cycle.id, &[]).await.unwrap();
    assert!(report.all_succeeded());
    assert_eq!(report.succeeded, 2);
    for system in SystemBasket::ALL {
        assert_eq!(report.outcome(&system.id()), Some(&ItemStatus::Created));
        assert!(store.get_basket(system.id()).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_update_overwrites_and_creates() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let engine = BasketCompositionEngine::new(Arc::clone(&store));
    let cycle = coordinator.create_cycle(new_cycle(&[])).await.unwrap();

    let existing = Basket::new("Cesta média", dec!(90), vec![]);
    let fresh = Basket::new("Cesta frutas", dec!(70), vec![]);
    store.insert_basket(&existing).await.unwrap();
    store.insert_basket(&fresh).await.unwrap();
    engine
        .compose_for_cycle(cycle.id, &[BasketRequest { basket_id: existing.id, quantity: 5 }])
        .await
        .unwrap();

    let report = engine
        .update_for_cycle(
            cycle.id,
            &[
                BasketRequest { basket_id: existing.id, quantity: 8 },
                BasketRequest { basket_id: fresh.id, quantity: 2 },
                BasketRequest { basket_id: SystemBasket::AdditionalItems.id(), quantity: 1 },
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.outcome(&existing.id), Some(&ItemStatus::Updated));
    assert_eq!(report.outcome(&fresh.id), Some(&ItemStatus::Created));
    assert_eq!(
        report.outcome(&SystemBasket::AdditionalItems.id()),
        Some(&ItemStatus::Unchanged)
    );

    let updated = store.find_composition(cycle.id, existing.id).await.unwrap().unwrap();
    assert_eq!(updated.quantity, 8);
}

#[tokio::test]
async fn test_allocation_and_demand_over_offers() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let engine = BasketCompositionEngine::new(Arc::clone(&store));
    let aggregator = OfferAggregator::new(Arc::clone(&store));
    let consolidator = OrderConsolidator::new(Arc::clone(&store));

    let cycle = coordinator.create_cycle(new_cycle(&[])).await.unwrap();
    let supplier_id = Uuid::new_v4();
    let ovos = Product::new(supplier_id, "Ovos", dec!(12.00));
    store.insert_product(&ovos).await.unwrap();

    let basket = Basket::new(
        "Cesta café",
        dec!(50),
        vec![BasketItem { product_id: ovos.id, quantity: 2 }],
    );
    store.insert_basket(&basket).await.unwrap();
    engine
        .compose_for_cycle(cycle.id, &[BasketRequest { basket_id: basket.id, quantity: 4 }])
        .await
        .unwrap();

    let offer = aggregator.find_or_create_offer(cycle.id, supplier_id).await.unwrap();
    aggregator.upsert_offer_item(offer.id, ovos.id, 6).await.unwrap();

    let plan = engine.plan_allocation(cycle.id).await.unwrap();
    let cafe = plan
        .compositions
        .iter()
        .find(|c| c.basket_id == basket.id)
        .unwrap();
    assert_eq!(cafe.lines[0].required, 8);
    assert_eq!(cafe.lines[0].allocated, 6);
    assert_eq!(cafe.lines[0].shortfall, 2);
    assert_eq!(cafe.complete_baskets, 3);
    assert!(!plan.is_fully_covered());

    let order = consolidator
        .upsert_consumer_order(cycle.id, Uuid::new_v4())
        .await
        .unwrap();
    consolidator.upsert_order_item(order.id, ovos.id, 9).await.unwrap();

    assert_eq!(consolidator.sum_ordered_quantity(cycle.id, ovos.id).await.unwrap(), 9);
    let demand = consolidator.consolidate_demand(cycle.id).await.unwrap();
    assert_eq!(demand.len(), 1);
    assert_eq!(demand[0].shortfall, 3);
}

#[tokio::test]
async fn test_consumer_order_lifecycle() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let consolidator = OrderConsolidator::new(Arc::clone(&store));
    let finalizer = ConsumerOrderFinalizer::new(Arc::clone(&store));
    let cycle_id = coordinator.create_cycle(new_cycle(&[])).await.unwrap().id;
    let consumer_id = Uuid::new_v4();

    assert_eq!(
        consolidator.order_state(cycle_id, consumer_id).await.unwrap(),
        OrderState::NeverOrdered
    );

    let order = consolidator.upsert_consumer_order(cycle_id, consumer_id).await.unwrap();
    let again = consolidator.upsert_consumer_order(cycle_id, consumer_id).await.unwrap();
    assert_eq!(order.id, again.id);
    assert!(!consolidator.is_finalized(cycle_id, consumer_id).await.unwrap());
    assert!(matches!(
        consolidator.order_state(cycle_id, consumer_id).await.unwrap(),
        OrderState::Open { .. }
    ));

    let feijao = Product::new(Uuid::new_v4(), "Feijão", dec!(8.00));
    let arroz = Product::new(Uuid::new_v4(), "Arroz", dec!(6.50));
    store.insert_product(&feijao).await.unwrap();
    store.insert_product(&arroz).await.unwrap();
    consolidator.upsert_order_item(order.id, feijao.id, 0).await.unwrap();
    consolidator.upsert_order_item(order.id, arroz.id, 3).await.unwrap();
    assert_eq!(consolidator.order_items(order.id).await.unwrap().len(), 2);

    assert_eq!(consolidator.prune_empty_order_items(order.id).await.unwrap(), 1);
    let remaining = consolidator.order_items(order.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].product_id, arroz.id);

    let err = consolidator
        .upsert_order_item(order.id, Uuid::new_v4(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "product", .. }));

    finalizer.finalize(order.id, "finalizado").await.unwrap();
    let repeat = finalizer.finalize(order.id, "finalizado").await.unwrap();
    assert_eq!(repeat.status, "finalizado");
    assert!(consolidator.is_finalized(cycle_id, consumer_id).await.unwrap());
}

#[tokio::test]
async fn test_gating_follows_predecessor_status() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let cycle = coordinator
        .create_cycle(new_cycle(&[(SaleType::Basket, 1), (SaleType::Lot, 2)]))
        .await
        .unwrap();
    let (m1, m2) = (cycle.markets[0].id, cycle.markets[1].id);

    assert!(coordinator.is_blocked(cycle.id, m2).await.unwrap());
    let err = coordinator.start_composition(cycle.id, m2).await.unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::MarketBlocked { .. })));

    let started = coordinator.start_composition(cycle.id, m1).await.unwrap();
    assert_eq!(started.status, CompositionStatus::EmAndamento);
    let current = coordinator.current_market(cycle.id, None).await.unwrap().unwrap();
    assert_eq!(current.id, m1);

    coordinator.conclude_market(cycle.id, m1).await.unwrap();
    assert!(!coordinator.is_blocked(cycle.id, m2).await.unwrap());
    let next = coordinator.next_pending_market(cycle.id).await.unwrap().unwrap();
    assert_eq!(next.id, m2);

    let counts = coordinator.status_counts(cycle.id).await.unwrap();
    assert_eq!((counts.pendente, counts.em_andamento, counts.concluida), (1, 0, 1));
    assert!(!coordinator.all_markets_concluded(cycle.id).await.unwrap());
}

#[tokio::test]
async fn test_conclude_rejected_while_predecessor_unfinished() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let cycle = coordinator
        .create_cycle(new_cycle(&[(SaleType::Basket, 1), (SaleType::Lot, 2)]))
        .await
        .unwrap();
    let (m1, m2) = (cycle.markets[0].id, cycle.markets[1].id);

    let err = coordinator.conclude_market(cycle.id, m2).await.unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::MarketBlocked { .. })));

    let stored = coordinator.load_cycle(cycle.id).await.unwrap();
    assert!(stored.markets.iter().all(|m| m.status == CompositionStatus::Pendente));

    coordinator.conclude_market(cycle.id, m1).await.unwrap();
    let done = coordinator.conclude_market(cycle.id, m2).await.unwrap();
    assert_eq!(done.status, CompositionStatus::Concluida);
    assert!(coordinator.all_markets_concluded(cycle.id).await.unwrap());
}

#[tokio::test]
async fn test_release_direct_sale_reasons() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let cycle = coordinator
        .create_cycle(new_cycle(&[(SaleType::Lot, 1), (SaleType::DirectSale, 2)]))
        .await
        .unwrap();
    let (lot, direct) = (cycle.markets[0].id, cycle.markets[1].id);

    let decision = coordinator.release_direct_sale(cycle.id, lot).await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(ReleaseDenial::NotDirectSale));
    assert_eq!(decision.reason.unwrap().to_string(), "Não é venda direta");

    let decision = coordinator.release_direct_sale(cycle.id, direct).await.unwrap();
    assert_eq!(decision.reason, Some(ReleaseDenial::NothingComposed));

    store
        .set_market_status(direct, CompositionStatus::EmAndamento)
        .await
        .unwrap();
    assert!(coordinator.release_direct_sale(cycle.id, direct).await.unwrap().allowed);

    let mut inactive = coordinator.load_cycle(cycle.id).await.unwrap();
    inactive.activation = Activation::Inativo;
    coordinator.update_cycle(&inactive, &[]).await.unwrap();
    let decision = coordinator.release_direct_sale(cycle.id, direct).await.unwrap();
    assert_eq!(decision.reason, Some(ReleaseDenial::CycleInactive));
}

#[tokio::test]
async fn test_cycle_stage_transitions() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let cycle = coordinator.create_cycle(new_cycle(&[])).await.unwrap();

    let window = coordinator.is_open_for_orders(cycle.id, Utc::now()).await.unwrap();
    assert_eq!(window.reason, Some(ClosedReason::NoStatus));

    let err = coordinator
        .transition_cycle(cycle.id, CycleStatus::Composicao)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::IllegalTransition { .. })));

    assert_eq!(
        coordinator.transition_cycle(cycle.id, CycleStatus::Oferta).await.unwrap(),
        Transition::Advance(CycleStatus::Oferta)
    );
    assert_eq!(
        coordinator.transition_cycle(cycle.id, CycleStatus::Oferta).await.unwrap(),
        Transition::Unchanged
    );
    assert!(coordinator.is_open_for_orders(cycle.id, Utc::now()).await.unwrap().open);

    coordinator.transition_cycle(cycle.id, CycleStatus::Composicao).await.unwrap();
    let err = coordinator
        .transition_cycle(cycle.id, CycleStatus::Oferta)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(_)));
}

#[tokio::test]
async fn test_create_cycle_rejects_duplicate_ordem() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));

    let err = coordinator
        .create_cycle(new_cycle(&[(SaleType::Basket, 1), (SaleType::Lot, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::DuplicateOrdem { ordem: 1 })));

    let cycle = coordinator.create_cycle(new_cycle(&[(SaleType::Basket, 1)])).await.unwrap();
    let err = coordinator
        .add_market(cycle.id, SaleType::Lot, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::DuplicateOrdem { .. })));
    let added = coordinator.add_market(cycle.id, SaleType::Lot, 2).await.unwrap();
    assert_eq!(added.ordem, 2);
}

#[tokio::test]
async fn test_update_cycle_replaces_delivery_windows() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let mut cycle = coordinator.create_cycle(new_cycle(&[])).await.unwrap();

    coordinator
        .update_cycle(&cycle, &[window(50, 52), window(53, 55)])
        .await
        .unwrap();
    assert_eq!(coordinator.delivery_windows(cycle.id).await.unwrap().len(), 2);

    cycle.name = "Ciclo renomeado".to_string();
    coordinator.update_cycle(&cycle, &[window(60, 62)]).await.unwrap();

    let windows = coordinator.delivery_windows(cycle.id).await.unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(coordinator.load_cycle(cycle.id).await.unwrap().name, "Ciclo renomeado");

    let err = coordinator
        .update_cycle(&cycle, &[window(10, 5)])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::InvertedWindow { .. })));
}

#[tokio::test]
async fn test_update_cycle_cannot_move_stage() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));
    let cycle = coordinator.create_cycle(new_cycle(&[])).await.unwrap();
    coordinator.transition_cycle(cycle.id, CycleStatus::Oferta).await.unwrap();
    coordinator.transition_cycle(cycle.id, CycleStatus::Composicao).await.unwrap();

    for status in [Some(CycleStatus::Oferta), Some(CycleStatus::Finalizado), None] {
        let mut edited = coordinator.load_cycle(cycle.id).await.unwrap();
        edited.status = status;
        let err = coordinator.update_cycle(&edited, &[]).await.unwrap_err();
        assert!(matches!(err, EngineError::ValidationRejected(_)));
    }

    let mut renamed = coordinator.load_cycle(cycle.id).await.unwrap();
    renamed.name = "Ciclo de inverno".to_string();
    coordinator.update_cycle(&renamed, &[]).await.unwrap();

    let stored = coordinator.load_cycle(cycle.id).await.unwrap();
    assert_eq!(stored.status, Some(CycleStatus::Composicao));
    assert_eq!(stored.name, "Ciclo de inverno");
}

#[tokio::test]
async fn test_delete_cycle_rejected_while_referenced() {
    let store = seeded_store().await;
    let coordinator = MarketCoordinator::new(Arc::clone(&store));

    let busy = coordinator.create_cycle(new_cycle(&[(SaleType::Basket, 1)])).await.unwrap();
    let err = coordinator.delete_cycle(busy.id).await.unwrap_err();
    assert!(matches!(err, EngineError::ValidationRejected(_)));

    let empty = coordinator.create_cycle(new_cycle(&[])).await.unwrap();
    coordinator.delete_cycle(empty.id).await.unwrap();
    assert!(matches!(
        coordinator.load_cycle(empty.id).await.unwrap_err(),
        EngineError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    assert_eq!(ensure_system_baskets(store.as_ref()).await.unwrap(), 2);
    assert_eq!(ensure_system_baskets(store.as_ref()).await.unwrap(), 0);
    assert_eq!(store.list_baskets().await.unwrap().len(), 2);
}
