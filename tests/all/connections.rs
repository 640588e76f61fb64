use crate::helpers::{get_manager, Event, FakeBroker};
use carrot_pool::transport::BrokerConnection;
use carrot_pool::Error;
use fake::{Fake, Faker};
use std::time::Duration;

#[tokio::test]
async fn connections_up_to_capacity_are_acquired_without_waiting() {
    // Arrange
    let broker = FakeBroker::default();
    let manager = get_manager(&broker, Some(2), None);

    // Act
    let (first, second) = tokio::time::timeout(Duration::from_secs(1), async {
        tokio::join!(manager.acquire_connection(), manager.acquire_connection())
    })
    .await
    .expect("Acquiring connections below capacity should not wait");

    // Assert
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_ne!(first.id, second.id);
    assert_eq!(2, broker.n_connections());
}

#[tokio::test]
async fn acquiring_beyond_capacity_waits_for_a_release() {
    // Arrange
    let broker = FakeBroker::default();
    let manager = get_manager(&broker, Some(2), None);
    let first = manager.acquire_connection().await.unwrap();
    let _second = manager.acquire_connection().await.unwrap();
    let first_id = first.id;

    // Act
    let third = manager.acquire_connection();
    tokio::pin!(third);
    let waited = tokio::time::timeout(Duration::from_millis(50), &mut third)
        .await
        .is_err();
    drop(first);
    let third = tokio::time::timeout(Duration::from_secs(1), third)
        .await
        .expect("The waiting caller was not resumed after a release")
        .unwrap();

    // Assert
    assert!(waited);
    assert_eq!(first_id, third.id);
    assert_eq!(2, broker.n_connections());
}

#[tokio::test]
async fn released_connections_are_reused() {
    // Arrange
    let broker = FakeBroker::default();
    let manager = get_manager(&broker, None, None);

    // Act
    for _ in 0..5 {
        let _connection = manager.acquire_connection().await.unwrap();
    }

    // Assert
    assert_eq!(1, broker.n_connections());
    assert_eq!(1, manager.connection_pool().status().available);
}

#[tokio::test]
async fn get_connection_keeps_its_capacity_slot() {
    // Arrange
    let broker = FakeBroker::default();
    let manager = get_manager(&broker, Some(1), None);
    let owned = manager.get_connection().await.unwrap();

    // Act
    for _ in 0..4 {
        let outcome =
            tokio::time::timeout(Duration::from_millis(20), manager.get_connection()).await;
        assert!(outcome.is_err());
    }
    manager.close().await;

    // Assert
    assert_eq!(1, broker.n_connections());
    assert_eq!(1, broker.count(|e| *e == Event::CloseConnection(owned.id)));
    assert!(owned.is_closed());
}

#[tokio::test]
async fn closed_connections_give_their_slot_back() {
    // Arrange
    let broker = FakeBroker::default();
    let manager = get_manager(&broker, Some(1), None);
    let owned = manager.get_connection().await.unwrap();
    assert_eq!(1, manager.connection_pool().status().detached);

    // Act
    owned.close().await.unwrap();
    let pooled = tokio::time::timeout(Duration::from_secs(1), manager.acquire_connection())
        .await
        .expect("A closed connection should free its slot")
        .unwrap();

    // Assert
    assert_ne!(owned.id, pooled.id);
    assert_eq!(0, manager.connection_pool().status().detached);
    assert_eq!(1, manager.connection_pool().status().size);
}

#[tokio::test]
async fn cancelling_a_parked_acquire_does_not_leak_a_slot() {
    // Arrange
    let broker = FakeBroker::default();
    let manager = get_manager(&broker, Some(1), None);
    let held = manager.acquire_connection().await.unwrap();
    let held_id = held.id;

    // Act
    let cancelled =
        tokio::time::timeout(Duration::from_millis(20), manager.acquire_connection()).await;
    drop(held);
    let next = tokio::time::timeout(Duration::from_secs(1), manager.acquire_connection())
        .await
        .expect("The cancelled caller kept a capacity slot")
        .unwrap();

    // Assert
    assert!(cancelled.is_err());
    assert_eq!(held_id, next.id);
    assert_eq!(1, broker.n_connections());
    assert_eq!(1, manager.connection_pool().status().size);
}

#[tokio::test]
async fn cancelling_an_acquire_while_connecting_does_not_leak_a_slot() {
    // Arrange
    let broker = FakeBroker::default();
    let manager = get_manager(&broker, Some(1), None);
    broker.stall_connect(true);

    // Act
    let cancelled =
        tokio::time::timeout(Duration::from_millis(20), manager.acquire_connection()).await;
    broker.stall_connect(false);
    let connection = tokio::time::timeout(Duration::from_secs(1), manager.acquire_connection())
        .await
        .expect("The cancelled connection attempt kept a capacity slot")
        .unwrap();

    // Assert
    assert!(cancelled.is_err());
    assert_eq!(2, broker.connect_attempts());
    assert_eq!(1, broker.n_connections());
    assert_eq!(1, manager.connection_pool().status().size);
    drop(connection);
    manager.close().await;
    assert_eq!(1, broker.count(|e| matches!(e, Event::CloseConnection(_))));
}

#[tokio::test]
async fn connect_failures_are_propagated_without_retrying() {
    // Arrange
    let broker = FakeBroker::default();
    broker.fail_connect(true);
    let manager = get_manager(&broker, Some(1), Some(1));
    let queue_name: String = Faker.fake();

    // Act
    let connection = manager.acquire_connection().await;
    let attempts_after_connection = broker.connect_attempts();
    let channel = manager.acquire_channel(None).await;
    let attempts_after_channel = broker.connect_attempts();
    let queue_channel = manager.acquire_channel(Some(&queue_name)).await;

    // Assert
    assert!(matches!(connection, Err(Error::Connect(_))));
    assert!(matches!(channel, Err(Error::Connect(_))));
    assert!(matches!(queue_channel, Err(Error::Connect(_))));
    assert_eq!(1, attempts_after_connection);
    assert_eq!(2, attempts_after_channel);
    assert_eq!(3, broker.connect_attempts());
    assert!(manager.queue_channels().is_empty());
    assert_eq!(0, manager.connection_pool().status().size);
}

#[tokio::test]
async fn callers_can_retry_once_the_broker_is_back() {
    // Arrange
    let broker = FakeBroker::default();
    broker.fail_connect(true);
    let manager = get_manager(&broker, Some(1), Some(1));
    let queue_name: String = Faker.fake();
    assert!(manager.acquire_channel(Some(&queue_name)).await.is_err());

    // Act
    broker.fail_connect(false);
    let channel = manager.acquire_channel(Some(&queue_name)).await;

    // Assert
    assert!(channel.unwrap().is_sticky());
    assert_eq!(1, manager.queue_channels().len());
}
